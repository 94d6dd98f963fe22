use sqlx::PgPool;

use crate::error::AppError;
use crate::models::{Capability, Form, FormShare, Permissions, ShareRole};

/// A form together with what the caller may do on it.
#[derive(Debug, Clone)]
pub struct FormAccess {
    pub form: Form,
    pub role: ShareRole,
    pub permissions: Permissions,
}

impl FormAccess {
    /// 404 when the form does not exist, 403 when the caller neither owns it
    /// nor holds an unexpired share.
    pub async fn load(db: &PgPool, form_id: &str, user_id: &str) -> Result<FormAccess, AppError> {
        let form = Form::find(db, form_id)
            .await?
            .ok_or_else(|| AppError::not_found("Form"))?;

        let role = if form.owner_id == user_id {
            ShareRole::Owner
        } else {
            FormShare::active_role(db, form_id, user_id)
                .await?
                .ok_or_else(|| AppError::Forbidden("You do not have access to this form".into()))?
        };
        Ok(Self::new(form, role))
    }

    /// Loads the form and checks one capability.
    pub async fn require(
        db: &PgPool,
        form_id: &str,
        user_id: &str,
        capability: Capability,
    ) -> Result<FormAccess, AppError> {
        let access = Self::load(db, form_id, user_id).await?;
        access.check(capability)?;
        Ok(access)
    }

    /// Loads the form and insists the caller owns it.
    pub async fn owner(db: &PgPool, form_id: &str, user_id: &str) -> Result<Form, AppError> {
        let form = Form::find(db, form_id)
            .await?
            .ok_or_else(|| AppError::not_found("Form"))?;
        if form.owner_id != user_id {
            return Err(AppError::Forbidden("Only the form owner can do this".into()));
        }
        Ok(form)
    }

    pub fn new(form: Form, role: ShareRole) -> Self {
        Self {
            form,
            role,
            permissions: role.permissions(),
        }
    }

    pub fn check(&self, capability: Capability) -> Result<(), AppError> {
        if self.permissions.allows(capability) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "Your role on this form does not allow this ({capability:?})"
            )))
        }
    }

    pub fn is_owner(&self) -> bool {
        self.role == ShareRole::Owner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FormKind, FormSettings};
    use axum::http::StatusCode;
    use chrono::Utc;
    use sqlx::types::Json;

    fn form() -> Form {
        Form {
            id: "f".into(),
            owner_id: "owner".into(),
            title: "T".into(),
            description: String::new(),
            kind: Json(FormKind::General),
            logo: None,
            header_image: None,
            custom_details: Json(vec![]),
            fields: Json(vec![]),
            settings: Json(FormSettings::default()),
            source_template: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn viewers_cannot_edit() {
        let access = FormAccess::new(form(), ShareRole::Viewer);
        assert!(access.check(Capability::ViewResponses).is_ok());
        let err = access.check(Capability::Edit).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        assert!(!access.is_owner());
    }

    #[test]
    fn response_managers_moderate() {
        let access = FormAccess::new(form(), ShareRole::ResponseManager);
        assert!(access.check(Capability::DeleteResponses).is_ok());
        assert!(access.check(Capability::Comment).is_ok());
        assert!(access.check(Capability::Share).is_err());
    }

    #[test]
    fn owners_can_do_everything() {
        let access = FormAccess::new(form(), ShareRole::Owner);
        assert!(access.is_owner());
        for capability in [
            Capability::Edit,
            Capability::ViewResponses,
            Capability::DeleteResponses,
            Capability::Comment,
            Capability::Share,
            Capability::Delete,
        ] {
            assert!(access.check(capability).is_ok());
        }
    }
}
