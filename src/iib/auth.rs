//! Kerberos authentication for IIB write requests
//!
//! reqwest has no SPNEGO support, so authenticated calls are handed to
//! `curl --negotiate`, which picks the ticket up from the credential cache
//! that `kinit` fills.

use crate::common::{CommandOptions, CommandRunner};
use crate::error::{IibPushError, Result};
use crate::logging::Logger;
use reqwest::StatusCode;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KerberosAuth {
    pub principal: String,
    pub ktfile: Option<PathBuf>,
}

impl KerberosAuth {
    pub fn new(principal: impl Into<String>, ktfile: Option<PathBuf>) -> Self {
        Self {
            principal: principal.into(),
            ktfile,
        }
    }

    /// Make sure a usable ticket exists for the principal.
    ///
    /// With a keytab a fresh ticket is always requested; without one an
    /// existing ticket in the default cache is required.
    pub async fn ensure_ticket(&self, runner: &dyn CommandRunner, logger: &Logger) -> Result<()> {
        match &self.ktfile {
            Some(ktfile) => {
                logger.debug(&format!(
                    "Requesting Kerberos ticket for {} from {}",
                    self.principal,
                    ktfile.display()
                ));
                let args = vec![
                    "-k".to_string(),
                    "-t".to_string(),
                    ktfile.display().to_string(),
                    self.principal.clone(),
                ];
                runner
                    .run_checked("kinit", &args, &CommandOptions::default())
                    .await
                    .map_err(|e| IibPushError::Auth(format!("kinit failed: {}", e)))?;
            }
            None => {
                let output = runner
                    .run_output("klist", &["-s".to_string()], &CommandOptions::default())
                    .await?;
                if !output.success() {
                    return Err(IibPushError::Auth(format!(
                        "No valid Kerberos ticket for {}; run kinit or pass --iib-krb-ktfile",
                        self.principal
                    )));
                }
            }
        }
        Ok(())
    }

    /// POST a JSON body with SPNEGO authentication.
    ///
    /// Returns the HTTP status and the raw response body.
    pub async fn negotiate_post(
        &self,
        runner: &dyn CommandRunner,
        url: &str,
        body: &[u8],
        insecure: bool,
    ) -> Result<(StatusCode, String)> {
        let mut args: Vec<String> = [
            "--negotiate",
            "--user",
            ":",
            "--silent",
            "--show-error",
            "--request",
            "POST",
            "--header",
            "Content-Type: application/json",
            "--data-binary",
            "@-",
            "--write-out",
            "\n%{http_code}",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        if insecure {
            args.push("--insecure".to_string());
        }
        args.push(url.to_string());

        let output = runner
            .run_checked("curl", &args, &CommandOptions::default().with_stdin(body))
            .await?;
        parse_curl_output(&output.stdout_lossy())
    }
}

/// Split curl output produced with `--write-out "\n%{http_code}"`.
fn parse_curl_output(stdout: &str) -> Result<(StatusCode, String)> {
    let (body, code) = stdout.rsplit_once('\n').unwrap_or(("", stdout));
    let status = code
        .trim()
        .parse::<u16>()
        .ok()
        .and_then(|c| StatusCode::from_u16(c).ok())
        .ok_or_else(|| IibPushError::Parse(format!("Unexpected curl status line: '{}'", code)))?;
    Ok((status, body.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::CommandOutput;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct ScriptedRunner {
        calls: Mutex<Vec<(String, Vec<String>, CommandOptions)>>,
        responses: Mutex<Vec<CommandOutput>>,
    }

    #[async_trait]
    impl CommandRunner for ScriptedRunner {
        async fn run_output(
            &self,
            program: &str,
            args: &[String],
            options: &CommandOptions,
        ) -> Result<CommandOutput> {
            self.calls
                .lock()
                .unwrap()
                .push((program.to_string(), args.to_vec(), options.clone()));
            Ok(self.responses.lock().unwrap().remove(0))
        }
    }

    fn ok(stdout: &str) -> CommandOutput {
        CommandOutput {
            status_code: Some(0),
            stdout: stdout.as_bytes().to_vec(),
            stderr: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_ensure_ticket_with_keytab_runs_kinit() {
        let runner = ScriptedRunner::default();
        runner.responses.lock().unwrap().push(ok(""));
        let auth = KerberosAuth::new("example@REALM", Some(PathBuf::from("/etc/iib.keytab")));

        auth.ensure_ticket(&runner, &Logger::new_quiet()).await.unwrap();

        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls[0].0, "kinit");
        assert_eq!(calls[0].1, ["-k", "-t", "/etc/iib.keytab", "example@REALM"]);
    }

    #[tokio::test]
    async fn test_ensure_ticket_without_cache_fails() {
        let runner = ScriptedRunner::default();
        runner.responses.lock().unwrap().push(CommandOutput {
            status_code: Some(1),
            ..Default::default()
        });
        let auth = KerberosAuth::new("example@REALM", None);

        let err = auth
            .ensure_ticket(&runner, &Logger::new_quiet())
            .await
            .unwrap_err();
        assert!(matches!(err, IibPushError::Auth(_)));
        assert_eq!(runner.calls.lock().unwrap()[0].0, "klist");
    }

    #[tokio::test]
    async fn test_negotiate_post_pipes_body_and_parses_status() {
        let runner = ScriptedRunner::default();
        runner
            .responses
            .lock()
            .unwrap()
            .push(ok("{\"id\": 1, \"state\": \"in_progress\"}\n201"));
        let auth = KerberosAuth::new("example@REALM", None);

        let (status, body) = auth
            .negotiate_post(&runner, "https://iib/api/v1/builds/add", b"{}", true)
            .await
            .unwrap();

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body, "{\"id\": 1, \"state\": \"in_progress\"}");
        let calls = runner.calls.lock().unwrap();
        let (program, args, options) = &calls[0];
        assert_eq!(program, "curl");
        assert!(args.contains(&"--negotiate".to_string()));
        assert!(args.contains(&"--insecure".to_string()));
        assert_eq!(args.last().unwrap(), "https://iib/api/v1/builds/add");
        assert_eq!(options.stdin.as_deref(), Some(b"{}".as_slice()));
    }

    #[test]
    fn test_parse_curl_output_rejects_garbage() {
        assert!(parse_curl_output("no status here").is_err());
        let (status, body) = parse_curl_output("\n404").unwrap();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, "");
    }
}
