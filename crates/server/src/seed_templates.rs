use anyhow::Context;
use form_analytics::{Field, FieldType, FieldWidth};
use formcraft::models::{FormSettings, NewTemplate, Template, TemplateCategory};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

fn field(id: &str, field_type: FieldType, label: &str, required: bool, order: i32) -> Field {
    let mut field = Field::new(id, field_type, label);
    field.required = required;
    field.order = order;
    field
}

fn placeholder(mut field: Field, text: &str) -> Field {
    field.placeholder = Some(text.to_string());
    field
}

fn half(mut field: Field) -> Field {
    field.width = FieldWidth::Half;
    field
}

fn settings(allow_multiple: bool, notify: bool, message: &str) -> FormSettings {
    FormSettings {
        allow_multiple_submissions: allow_multiple,
        notify_on_submission: notify,
        custom_message: Some(message.to_string()),
        ..FormSettings::default()
    }
}

fn premade(
    name: &str,
    description: &str,
    category: TemplateCategory,
    thumbnail: &str,
    fields: Vec<Field>,
    settings: FormSettings,
) -> NewTemplate {
    NewTemplate {
        name: name.to_string(),
        description: description.to_string(),
        category,
        thumbnail: thumbnail.to_string(),
        is_premade: true,
        fields,
        settings,
        created_by: None,
    }
}

fn premade_templates() -> Vec<NewTemplate> {
    use FieldType::*;

    vec![
        premade(
            "Contact Form",
            "Simple contact form with name, email, and message fields",
            TemplateCategory::Contact,
            "📧",
            vec![
                placeholder(field("full_name", ShortText, "Full Name", true, 0), "Enter your full name"),
                placeholder(field("email", Email, "Email Address", true, 1), "your@email.com"),
                placeholder(field("subject", ShortText, "Subject", false, 2), "What is this about?"),
                placeholder(field("message", LongText, "Message", true, 3), "Type your message here..."),
            ],
            settings(true, true, "Thank you for contacting us! We will get back to you soon."),
        ),
        premade(
            "Customer Feedback Survey",
            "Collect customer satisfaction ratings and feedback",
            TemplateCategory::Feedback,
            "⭐",
            vec![
                half(placeholder(field("name", ShortText, "Your Name", true, 0), "Enter your name")),
                half(placeholder(field("email", Email, "Email", true, 1), "your@email.com")),
                placeholder(field("satisfaction", Rating, "Overall Satisfaction", true, 2), "Rate your experience"),
                field("recommend", Radio, "Would you recommend us?", true, 3).with_options([
                    "Definitely",
                    "Probably",
                    "Not sure",
                    "Probably not",
                    "Definitely not",
                ]),
                placeholder(field("comments", LongText, "Additional Comments", false, 4), "Share your thoughts..."),
            ],
            settings(false, true, "Thank you for your feedback!"),
        ),
        premade(
            "Event Registration",
            "Complete event registration form with attendee details",
            TemplateCategory::Registration,
            "🎟️",
            vec![
                placeholder(field("full_name", ShortText, "Full Name", true, 0), "Enter your full name"),
                half(placeholder(field("email", Email, "Email Address", true, 1), "your@email.com")),
                half(placeholder(field("phone", ShortText, "Phone Number", true, 2), "+1234567890")),
                placeholder(field("organization", ShortText, "Company/Organization", false, 3), "Your organization"),
                half(field("ticket", Dropdown, "Ticket Type", true, 4).with_options([
                    "Early Bird",
                    "Regular",
                    "VIP",
                    "Student",
                ])),
                half(placeholder(field("attendees", Number, "Number of Attendees", true, 5), "1")),
                field("dietary", Checkbox, "Dietary Requirements", false, 6).with_options([
                    "Vegetarian",
                    "Vegan",
                    "Gluten-free",
                    "Dairy-free",
                    "None",
                ]),
                placeholder(
                    field("special", LongText, "Special Requirements", false, 7),
                    "Any special accommodations needed?",
                ),
            ],
            settings(false, true, "Registration successful! Check your email for confirmation."),
        ),
        premade(
            "Job Application",
            "Comprehensive job application form",
            TemplateCategory::Registration,
            "💼",
            vec![
                placeholder(field("full_name", ShortText, "Full Name", true, 0), "Enter your full name"),
                half(placeholder(field("email", Email, "Email", true, 1), "your@email.com")),
                half(placeholder(field("phone", ShortText, "Phone", true, 2), "+1234567890")),
                field("position", Dropdown, "Position Applied For", true, 3).with_options([
                    "Software Engineer",
                    "Designer",
                    "Product Manager",
                    "Marketing",
                    "Sales",
                    "Other",
                ]),
                placeholder(field("company", ShortText, "Current Company", false, 4), "Your current employer"),
                half(placeholder(field("experience", Number, "Years of Experience", true, 5), "0")),
                half(placeholder(field("salary", ShortText, "Expected Salary", false, 6), "$XXX,XXX")),
                placeholder(field("resume", File, "Resume/CV", true, 7), "Upload your resume"),
                placeholder(
                    field("cover_letter", LongText, "Cover Letter", false, 8),
                    "Tell us why you want to join...",
                ),
            ],
            settings(false, true, "Application submitted! We will review and get back to you."),
        ),
        premade(
            "Quick Survey",
            "Simple multi-choice survey template",
            TemplateCategory::Survey,
            "📊",
            vec![
                placeholder(field("name", ShortText, "Your Name (Optional)", false, 0), "Enter your name"),
                field("source", Radio, "How did you hear about us?", true, 1).with_options([
                    "Social Media",
                    "Search Engine",
                    "Friend Referral",
                    "Advertisement",
                    "Other",
                ]),
                field("features", Checkbox, "Which features interest you?", true, 2).with_options([
                    "Feature A",
                    "Feature B",
                    "Feature C",
                    "Feature D",
                ]),
                placeholder(field("experience", Rating, "Rate your experience", true, 3), "Select rating"),
                placeholder(
                    field("suggestions", LongText, "Any suggestions?", false, 4),
                    "We appreciate your feedback...",
                ),
            ],
            settings(false, false, "Thank you for completing our survey!"),
        ),
    ]
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let db = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("connecting to the database")?;
    sqlx::migrate!().run(&db).await.context("running migrations")?;
    tracing::info!("Connected to database");

    let mut count = 0;
    let mut skipped = 0;
    for template in premade_templates() {
        if Template::exists_named(&db, &template.name).await? {
            tracing::info!("Skipped (already present): {}", template.name);
            skipped += 1;
            continue;
        }
        let name = template.name.clone();
        Template::insert(&db, template).await?;
        tracing::info!("Loaded: {name}");
        count += 1;
    }

    tracing::info!(loaded = count, skipped, "template seeding finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn premade_set_is_well_formed() {
        let templates = premade_templates();
        assert_eq!(templates.len(), 5);
        for template in &templates {
            assert!(template.is_premade);
            let ids: HashSet<&str> = template.fields.iter().map(|f| f.id.as_str()).collect();
            assert_eq!(ids.len(), template.fields.len(), "duplicate field id in {}", template.name);
        }
    }
}
