mod api;
mod auth;
mod render;

use std::env;
use std::io::{self, Write};

use anyhow::Context;
use colored::*;
use form_analytics::Granularity;

use api::{Api, FormSummary};

const DEFAULT_BACKEND_URL: &str = "http://localhost:3000";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let supabase_url = env::var("SUPABASE_URL").context("SUPABASE_URL must be set")?;
    let backend_url = env::var("FORMCRAFT_URL").unwrap_or_else(|_| DEFAULT_BACKEND_URL.to_string());
    let provider = env::var("FORMCRAFT_AUTH_PROVIDER").unwrap_or_else(|_| "github".to_string());

    println!("{}", render::header("FORMCRAFT ANALYTICS"));
    println!();

    let token = match auth::authenticate(&supabase_url, &provider).await {
        Ok(t) => t,
        Err(e) => {
            eprintln!("{} {}", "❌ Authentication failed:".red().bold(), e);
            return Ok(());
        }
    };

    println!("{}", "✅ Authentication successful!".green().bold());
    println!();

    let api = Api::new(backend_url, token);
    browse_loop(&api).await
}

fn prompt(hint: &str) -> anyhow::Result<String> {
    println!("{}", hint.bright_black());
    print!("{}", "> ".bright_green().bold());
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_lowercase())
}

async fn browse_loop(api: &Api) -> anyhow::Result<()> {
    loop {
        println!("Fetching your forms...");
        let forms = api.forms().await?;
        if forms.is_empty() {
            println!("{}", "You have no forms yet.".yellow());
            return Ok(());
        }

        println!();
        for (i, form) in forms.iter().enumerate() {
            println!(
                "  {} {}  {}",
                format!("[{}]", i + 1).bright_cyan(),
                form.title.bright_white().bold(),
                form.updated_at.format("%Y-%m-%d").to_string().bright_black()
            );
        }
        println!();

        let choice = prompt("Pick a form by number, or [Q]uit")?;
        if matches!(choice.as_str(), "q" | "quit") {
            println!("{}", "Bye! 👋".bright_cyan().bold());
            return Ok(());
        }
        let Some(form) = choice
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| forms.get(i))
        else {
            println!("{}", "Invalid choice. Please try again.".red());
            continue;
        };

        if !form_loop(api, form).await? {
            println!("{}", "Bye! 👋".bright_cyan().bold());
            return Ok(());
        }
    }
}

/// Returns `false` when the user asked to quit entirely.
async fn form_loop(api: &Api, form: &FormSummary) -> anyhow::Result<bool> {
    println!();
    println!("{}", render::header(&form.title));
    if !form.description.is_empty() {
        println!("{}", form.description.bright_black());
    }
    println!();
    print!("{}", render::stats(&api.stats(&form.id).await?));
    println!();

    loop {
        let choice = prompt("[F]ields  Timeline: [D]aily [W]eekly [M]onthly  [B]ack  [Q]uit")?;
        let granularity = match choice.as_str() {
            "f" | "fields" => {
                println!();
                println!("{}", render::fields(&api.fields(&form.id).await?, &form.field_order()));
                continue;
            }
            "d" | "daily" => Granularity::Daily,
            "w" | "weekly" => Granularity::Weekly,
            "m" | "monthly" => Granularity::Monthly,
            "b" | "back" => return Ok(true),
            "q" | "quit" => return Ok(false),
            _ => {
                println!("{}", "Invalid choice. Please try again.".red());
                continue;
            }
        };

        let reply = api.timeline(&form.id, granularity).await?;
        println!();
        print!("{}", render::timeline(&reply.timeline));
        println!();
    }
}
