//! Sign-in, registration, and sign-out commands.

use tote_client::AppContext;
use tote_client::identity::{LoginForm, RegisterForm};
use tracing::info;

/// Sign in with the form's credentials.
pub async fn login(context: &AppContext, form: &LoginForm) -> tote_client::Result<()> {
    let email = form.validate()?;
    let user = context.identity()?.sign_in(&email, &form.password).await?;
    info!("Signed in as {}", user.email);
    Ok(())
}

/// Create an account and sign in.
pub async fn register(context: &AppContext, form: &RegisterForm) -> tote_client::Result<()> {
    let (email, profile) = form.validate()?;
    let user = context
        .identity()?
        .sign_up(&email, &form.password, &profile)
        .await?;
    info!("Account created for {} {}", profile.first_name, profile.last_name);
    info!("Signed in as {}", user.email);
    Ok(())
}

/// Sign out.
pub async fn logout(context: &AppContext) -> tote_client::Result<()> {
    context.identity()?.sign_out().await;
    info!("Signed out");
    Ok(())
}

/// Show the signed-in user.
pub fn whoami(context: &AppContext) -> tote_client::Result<()> {
    match context.identity()?.current_user() {
        Some(user) => info!("{} ({})", user.email, user.uid),
        None => info!("Not signed in"),
    }
    Ok(())
}
