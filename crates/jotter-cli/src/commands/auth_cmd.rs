use crate::auth::{auth_client_for_profile, clear_stored_session, restore_session};
use crate::cli::AuthCommands;
use crate::commands::common::{format_timestamp, CliContext};
use crate::error::CliError;

pub async fn run_auth(command: AuthCommands, context: &CliContext) -> Result<(), CliError> {
    let profile_name = context.profile_name.as_str();
    match command {
        AuthCommands::Login { email, password } => {
            let client = auth_client_for_profile(profile_name, &context.profile)?
                .ok_or_else(|| {
                    CliError::Config(format!(
                        "Profile '{profile_name}' has no auth API key. Run `jotter config init --auth-api-key <key>`."
                    ))
                })?;
            let session = client
                .sign_in(&email, &password)
                .await
                .map_err(|error| CliError::Auth(error.to_string()))?;
            let email_label = session.user.email.as_deref().unwrap_or("(no email)");
            println!("Signed in profile '{profile_name}' as {email_label}");
            Ok(())
        }
        AuthCommands::Status => {
            let session = restore_session(profile_name, &context.profile)
                .await
                .map_err(|error| CliError::Auth(error.to_string()))?;
            if let Some(session) = session {
                let email_label = session.user.email.as_deref().unwrap_or("(no email)");
                println!(
                    "Profile '{}' is signed in as {} ({}), expires {}",
                    profile_name,
                    email_label,
                    session.user.id,
                    format_timestamp(session.expires_at.saturating_mul(1000))
                );
            } else {
                println!("Profile '{profile_name}' is not signed in.");
            }
            Ok(())
        }
        AuthCommands::Logout => {
            match auth_client_for_profile(profile_name, &context.profile)? {
                Some(client) => client.sign_out()?,
                None => clear_stored_session(profile_name)?,
            }
            println!("Signed out profile '{profile_name}'");
            Ok(())
        }
    }
}
