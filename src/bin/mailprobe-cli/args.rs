use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, bail};
use clap::Parser;
use clap::builder::BoolishValueParser;
use mailprobe_lib::probe::DEFAULT_REGION_SUFFIX;
use mailprobe_lib::{ProbeConfig, ProxySettings};

#[derive(Parser)]
#[command(name = "mailprobe-cli", version, about)]
pub struct Cli {
    /// liste des adresses à tester (une par ligne)
    #[arg(long, env = "EMAILS_FILE", default_value = "emails.txt")]
    pub emails: PathBuf,

    /// domaines utilisables pour MAIL FROM (un par ligne)
    #[arg(long = "sender-domains", env = "SENDER_DOMAINS_FILE", default_value = "valid_send_domains.txt")]
    pub sender_domains: PathBuf,

    /// répertoire des fichiers de résultats
    #[arg(long = "out-dir", env = "OUTPUT_DIR", default_value = "retornos")]
    pub out_dir: PathBuf,

    /// passe le test de connexion par le proxy HTTP
    #[arg(long = "proxy-connection-test", env = "USE_PROXY1", value_parser = BoolishValueParser::new())]
    pub proxy_connection_test: bool,

    /// passe EHLO/MAIL FROM/RCPT TO par le proxy HTTP
    #[arg(long = "proxy-full-verification", env = "USE_PROXY2", value_parser = BoolishValueParser::new())]
    pub proxy_full_verification: bool,

    /// nombre maximum de sondes simultanées
    #[arg(long, env = "THREADS", default_value_t = 10)]
    pub threads: usize,

    /// journalisation détaillée (debug)
    #[arg(long, short = 'v', env = "LOGVIEWER", value_parser = BoolishValueParser::new())]
    pub verbose: bool,

    /// IP publique de sortie, cherchée dans les refus 550
    #[arg(long = "external-ip", env = "IP_EXTERNO")]
    pub external_ip: Option<String>,

    #[arg(long = "proxy-host", env = "PROXY_HOST")]
    pub proxy_host: Option<String>,

    #[arg(long = "proxy-port", env = "PROXY_PORT")]
    pub proxy_port: Option<u16>,

    #[arg(long = "proxy-username", env = "PROXY_USERNAME", default_value = "")]
    pub proxy_username: String,

    #[arg(long = "proxy-password", env = "PROXY_PASSWORD", default_value = "", hide_env_values = true)]
    pub proxy_password: String,

    /// suffixe ajouté au nom d'utilisateur du proxy
    #[arg(long = "proxy-region-suffix", env = "PROXY_REGION_SUFFIX", default_value = DEFAULT_REGION_SUFFIX)]
    pub proxy_region_suffix: String,

    /// ports SMTP testés, dans l'ordre
    #[arg(long = "port", env = "SMTP_PORTS", value_delimiter = ',', default_value = "25")]
    pub ports: Vec<u16>,

    /// timeout de connexion TCP (ms)
    #[arg(long = "connect-timeout", default_value_t = 10_000)]
    pub connect_timeout_ms: u64,

    /// délai max par réponse SMTP (ms, 0 = illimité)
    #[arg(long = "read-timeout", default_value_t = 30_000)]
    pub read_timeout_ms: u64,

    /// s'arrête après le test de connexion (Emails_validos.txt)
    #[arg(long = "reachability-only", env = "REACHABILITY_ONLY", value_parser = BoolishValueParser::new())]
    pub reachability_only: bool,

    /// imprime le bilan en JSON (feature `with-serde`)
    #[cfg(feature = "with-serde")]
    #[arg(long = "summary-json")]
    pub summary_json: bool,
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    pub fn proxy_settings(&self) -> Result<Option<ProxySettings>> {
        let wants_proxy = self.proxy_connection_test || self.proxy_full_verification;
        match (&self.proxy_host, self.proxy_port) {
            (Some(host), Some(port)) if !host.trim().is_empty() => {
                let mut proxy = ProxySettings::new(
                    host.trim(),
                    port,
                    self.proxy_username.as_str(),
                    self.proxy_password.as_str(),
                );
                proxy.region_suffix = self.proxy_region_suffix.clone();
                Ok(Some(proxy))
            }
            _ if wants_proxy => bail!("proxy enabled but PROXY_HOST/PROXY_PORT are not set"),
            _ => Ok(None),
        }
    }

    pub fn probe_config(&self) -> Result<ProbeConfig> {
        if self.ports.is_empty() {
            bail!("at least one --port is required");
        }
        Ok(ProbeConfig {
            proxy_for_connection_test: self.proxy_connection_test,
            proxy_for_full_verification: self.proxy_full_verification,
            proxy: self.proxy_settings()?,
            external_ip: self.external_ip.clone(),
            ports: self.ports.clone(),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            read_timeout: match self.read_timeout_ms {
                0 => None,
                ms => Some(Duration::from_millis(ms)),
            },
            stop_after_reachability: self.reachability_only,
            concurrency: self.threads.max(1),
            ..ProbeConfig::default()
        })
    }
}
