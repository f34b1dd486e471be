use crate::{
    model::{
        ModelValidationError,
        auth::Password,
        user::{CreateUser, Email, User, UserHandle},
    },
    service::{Result, ServiceError, ValidationError},
    store::Store,
};
use tracing::info;

/// A registration form as submitted, before any validation.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirmation: String,
}

pub async fn register<S: Store + ?Sized>(
    store: &S,
    registration: Registration,
) -> Result<User, S::Error> {
    if registration.password != registration.confirmation {
        return Err(ValidationError::PasswordMismatch.into());
    }

    let handle = UserHandle::new(registration.username).map_err(ModelValidationError::from)?;
    let email = Email::new(registration.email).map_err(ModelValidationError::from)?;
    let password = Password::new(registration.password).map_err(ModelValidationError::from)?;

    let user = CreateUser {
        handle,
        email,
        password_hash: password.hash()?,
    };
    let Some(created) = store
        .create_user(&user)
        .await
        .map_err(ServiceError::Store)?
    else {
        return Err(ServiceError::HandleTaken(user.handle));
    };

    info!(user = %created.id, handle = created.handle.get(), "Registered user");
    Ok(created)
}
