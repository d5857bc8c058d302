//! Let's Encrypt certificates through certbot's nginx plugin
//!
//! A failed issuance is not fatal: the site keeps serving plain HTTP and
//! the operator gets the command to retry by hand.

use anyhow::{Context, Result};

use crate::install_log::InstallLog;
use crate::runner::CommandRunner;
use crate::ui;

#[derive(Debug, Clone)]
pub struct CertRequest {
    pub domain: String,
    pub include_www: bool,
    pub email: String,
}

impl CertRequest {
    pub fn domains(&self) -> Vec<String> {
        let mut domains = vec![self.domain.clone()];
        if self.include_www && !self.domain.starts_with("www.") {
            domains.push(format!("www.{}", self.domain));
        }
        domains
    }

    pub fn certbot_args(&self) -> Vec<String> {
        let mut args = vec!["--nginx".to_string()];
        for domain in self.domains() {
            args.push("-d".to_string());
            args.push(domain);
        }
        args.extend(
            [
                "--non-interactive",
                "--agree-tos",
                "-m",
                self.email.as_str(),
                "--redirect",
            ]
            .map(String::from),
        );
        args
    }

    /// What to run by hand after a failed attempt
    pub fn manual_instructions(&self) -> String {
        format!(
            "Check that DNS for {} points at this server and that port 80 is reachable, then run:\n  sudo certbot {}",
            self.domains().join(", "),
            self.certbot_args().join(" ")
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertOutcome {
    Issued,
    /// certbot is missing or failed; details were shown to the operator
    Failed(String),
}

pub fn obtain(runner: &dyn CommandRunner, req: &CertRequest, log: &InstallLog) -> Result<CertOutcome> {
    if !runner.exists("certbot") {
        let reason = "certbot is not installed (menu option 1 installs it)".to_string();
        ui::warn(&reason);
        ui::dim(&req.manual_instructions());
        return Ok(CertOutcome::Failed(reason));
    }

    let args = req.certbot_args();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    let out = runner
        .capture("certbot", &args)
        .context("Failed to run certbot")?;

    if out.success {
        log.record(&format!("certificate issued for {}", req.domains().join(" ")));
        return Ok(CertOutcome::Issued);
    }

    let detail = out.combined();
    ui::warn(&format!("certbot could not obtain a certificate for {}", req.domain));
    for line in detail.lines().rev().take(5).collect::<Vec<_>>().into_iter().rev() {
        ui::dim(line);
    }
    ui::info(&req.manual_instructions());
    log.record(&format!("certbot failed for {}", req.domain));
    Ok(CertOutcome::Failed(detail))
}

/// `certbot renew --dry-run`; true when every renewal simulated cleanly
pub fn renew_dry_run(runner: &dyn CommandRunner) -> Result<bool> {
    runner.run("certbot", &["renew", "--dry-run"])
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CertInfo {
    pub name: String,
    pub domains: Vec<String>,
    pub expiry: String,
}

/// Parse `certbot certificates` output
pub fn parse_certificates(text: &str) -> Vec<CertInfo> {
    let mut certs: Vec<CertInfo> = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if let Some(name) = line.strip_prefix("Certificate Name:") {
            certs.push(CertInfo {
                name: name.trim().to_string(),
                ..Default::default()
            });
        } else if let Some(cert) = certs.last_mut() {
            if let Some(domains) = line.strip_prefix("Domains:") {
                cert.domains = domains.split_whitespace().map(String::from).collect();
            } else if let Some(expiry) = line.strip_prefix("Expiry Date:") {
                cert.expiry = expiry.trim().to_string();
            }
        }
    }
    certs
}

pub fn certificates(runner: &dyn CommandRunner) -> Result<Vec<CertInfo>> {
    if !runner.exists("certbot") {
        return Ok(Vec::new());
    }
    let out = runner.capture("certbot", &["certificates"])?;
    Ok(parse_certificates(&out.stdout))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::testing::FakeRunner;

    fn request(www: bool) -> CertRequest {
        CertRequest {
            domain: "example.com".into(),
            include_www: www,
            email: "ops@example.com".into(),
        }
    }

    #[test]
    fn certbot_arguments() {
        assert_eq!(
            request(true).certbot_args().join(" "),
            "--nginx -d example.com -d www.example.com --non-interactive --agree-tos -m ops@example.com --redirect"
        );
        assert_eq!(
            request(false).certbot_args().join(" "),
            "--nginx -d example.com --non-interactive --agree-tos -m ops@example.com --redirect"
        );
    }

    #[test]
    fn failure_is_downgraded() {
        let runner = FakeRunner::new().fail("certbot --nginx", "Challenge failed for domain example.com");
        let outcome = obtain(&runner, &request(true), &InstallLog::disabled()).unwrap();
        match outcome {
            CertOutcome::Failed(detail) => assert!(detail.contains("Challenge failed")),
            CertOutcome::Issued => panic!("expected failure"),
        }
    }

    #[test]
    fn success_is_issued() {
        let runner = FakeRunner::new();
        let outcome = obtain(&runner, &request(false), &InstallLog::disabled()).unwrap();
        assert_eq!(outcome, CertOutcome::Issued);
        assert!(runner.called("certbot --nginx -d example.com"));
    }

    #[test]
    fn missing_certbot_is_reported() {
        let runner = FakeRunner::new().without("certbot");
        let outcome = obtain(&runner, &request(false), &InstallLog::disabled()).unwrap();
        assert!(matches!(outcome, CertOutcome::Failed(_)));
        assert!(runner.calls.borrow().is_empty());
    }

    #[test]
    fn manual_instructions_include_command() {
        let text = request(false).manual_instructions();
        assert!(text.contains("sudo certbot --nginx -d example.com"));
    }

    #[test]
    fn parses_certificate_listing() {
        let text = "Saving debug log to /var/log/letsencrypt/letsencrypt.log

- - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - -
Found the following certs:
  Certificate Name: example.com
    Serial Number: 4a1b
    Key Type: ECDSA
    Domains: example.com www.example.com
    Expiry Date: 2026-12-01 10:00:00+00:00 (VALID: 42 days)
    Certificate Path: /etc/letsencrypt/live/example.com/fullchain.pem
  Certificate Name: other.org
    Domains: other.org
    Expiry Date: 2026-11-02 10:00:00+00:00 (VALID: 13 days)
";
        let certs = parse_certificates(text);
        assert_eq!(certs.len(), 2);
        assert_eq!(certs[0].name, "example.com");
        assert_eq!(certs[0].domains, vec!["example.com", "www.example.com"]);
        assert!(certs[0].expiry.contains("VALID: 42 days"));
        assert_eq!(certs[1].domains, vec!["other.org"]);
    }

    #[test]
    fn renew_runs_dry() {
        let runner = FakeRunner::new();
        assert!(renew_dry_run(&runner).unwrap());
        assert!(runner.called("certbot renew --dry-run"));
    }
}
