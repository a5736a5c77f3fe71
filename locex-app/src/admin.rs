use crate::cli::{AuthCommand, ExperimentCommand, ResultCommand, SampleCommand};
use anyhow::{bail, Context, Result};
use locex_client::{ApiClient, AuthContext};
use locex_core::{NewExperiment, NewSample, Sample};
use locex_experiment::{to_summary, write_delimited_file};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

/// Username and password from flags, environment or config.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Signs in when a password is available, otherwise asks the backend who we
/// are. An unreachable status endpoint counts as anonymous.
pub async fn sign_in(client: &ApiClient, credentials: &Credentials) -> Result<AuthContext> {
    if let (Some(username), Some(password)) = (&credentials.username, &credentials.password) {
        return client
            .login(username, password)
            .await
            .with_context(|| format!("login as {username} failed"));
    }
    match client.auth_status().await {
        Ok(auth) => Ok(auth),
        Err(e) => {
            warn!(error = %e, "Could not read session status, continuing anonymously");
            Ok(AuthContext::anonymous())
        }
    }
}

pub async fn auth(client: &ApiClient, credentials: &Credentials, action: AuthCommand) -> Result<()> {
    match action {
        AuthCommand::Status => {
            let auth = client.auth_status().await.context("session status")?;
            print_auth(&auth);
        }
        AuthCommand::Login => {
            if credentials.username.is_none() || credentials.password.is_none() {
                bail!("login needs --username and --password (or LOCEX_USERNAME/LOCEX_PASSWORD)");
            }
            let auth = sign_in(client, credentials).await?;
            print_auth(&auth);
        }
        AuthCommand::Logout => {
            let auth = client.logout().await.context("logout")?;
            print_auth(&auth);
        }
    }
    Ok(())
}

fn print_auth(auth: &AuthContext) {
    match &auth.username {
        Some(name) if auth.authenticated => println!("Signed in as {name}"),
        _ => println!("Not signed in"),
    }
}

pub async fn experiments(
    client: &ApiClient,
    credentials: &Credentials,
    action: ExperimentCommand,
) -> Result<()> {
    match action {
        ExperimentCommand::List => {
            let experiments = client.list_experiments().await.context("list experiments")?;
            if experiments.is_empty() {
                println!("No experiments");
            }
            for e in &experiments {
                println!(
                    "{:<24} {:<32} {:>3} samples{}",
                    e.id.as_str(),
                    e.name,
                    e.sample_ids.len(),
                    if e.is_public { "  public" } else { "" }
                );
            }
        }
        ExperimentCommand::Show { id } => {
            let experiment = client.experiment(&id).await.context("fetch experiment")?;
            let samples = client.list_samples().await.context("list samples")?;
            let by_id = index_samples(&samples);
            println!("{} ({})", experiment.name, experiment.id.as_str());
            for (i, sample_id) in experiment.sample_ids.iter().enumerate() {
                match by_id.get(sample_id.as_str()) {
                    Some(s) => println!(
                        "{:>3}. {:<24} azimuth {:>6.1}  elevation {:>6.1}",
                        i + 1,
                        s.name,
                        s.azimuth,
                        s.elevation
                    ),
                    None => println!("{:>3}. <deleted sample> ({sample_id})", i + 1),
                }
            }
        }
        ExperimentCommand::Create {
            name,
            samples,
            public,
        } => {
            sign_in(client, credentials).await?;
            let new = NewExperiment {
                name,
                sample_ids: samples,
                is_public: public,
            };
            client.create_experiment(&new).await?;
            println!("Created experiment {}", new.name);
        }
        ExperimentCommand::Delete { id } => {
            sign_in(client, credentials).await?;
            client.delete_experiment(&id).await?;
            println!("Deleted experiment {id}");
        }
    }
    Ok(())
}

pub async fn samples(
    client: &ApiClient,
    credentials: &Credentials,
    action: SampleCommand,
) -> Result<()> {
    match action {
        SampleCommand::List => {
            let samples = client.list_samples().await.context("list samples")?;
            if samples.is_empty() {
                println!("No samples");
            }
            for s in &samples {
                println!(
                    "{:<24} {:<24} azimuth {:>6.1}  elevation {:>6.1}",
                    s.id.as_str(),
                    s.name,
                    s.azimuth,
                    s.elevation
                );
            }
        }
        SampleCommand::Upload {
            name,
            azimuth,
            elevation,
            file,
        } => {
            let audio = std::fs::read(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let filename = file_name(&file)?;
            sign_in(client, credentials).await?;
            let sample = NewSample {
                name,
                azimuth,
                elevation,
            };
            client.upload_sample(&sample, audio, &filename).await?;
            println!("Uploaded sample {}", sample.name);
        }
        SampleCommand::Delete { id } => {
            sign_in(client, credentials).await?;
            client.delete_sample(&id).await?;
            println!("Deleted sample {id}");
        }
    }
    Ok(())
}

pub async fn results(client: &ApiClient, action: ResultCommand) -> Result<()> {
    match action {
        ResultCommand::Show { id } => {
            let runs = client.experiment_results(&id).await.context("fetch results")?;
            let samples = client.list_samples().await.context("list samples")?;
            if runs.is_empty() {
                println!("No results for {id}");
            } else {
                print!("{}", to_summary(&runs, &samples));
            }
        }
        ResultCommand::Export { id, out } => {
            let runs = client.experiment_results(&id).await.context("fetch results")?;
            let samples = client.list_samples().await.context("list samples")?;
            let rows = write_delimited_file(&out, &runs, &samples)?;
            info!(experiment = %id, runs = runs.len(), "Results exported");
            println!("Wrote {rows} rows to {}", out.display());
        }
    }
    Ok(())
}

fn index_samples(samples: &[Sample]) -> HashMap<&str, &Sample> {
    samples.iter().map(|s| (s.id.as_str(), s)).collect()
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .with_context(|| format!("{} is not a file path", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn upload_uses_the_bare_file_name() {
        assert_eq!(file_name(&PathBuf::from("/tmp/cues/left.wav")).unwrap(), "left.wav");
        assert!(file_name(&PathBuf::from("/")).is_err());
    }
}
