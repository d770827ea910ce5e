//! `abwright assign`: run one assignment and print it.

use std::path::Path;

use abwright_catalog::CatalogLoader;
use abwright_core::{
    Assignment, DocumentCookieJar, Environment, HeaderCookieJar, RequestContext, TracingAnalyticsSink,
    report_assignment,
};
use abwright_engine::AssignmentEngine;
use clap::Args;
use tracing::{debug, info};

#[derive(Args, Debug, Default)]
pub struct AssignArgs {
    /// Incoming cookies, e.g. "exp=hero.1; session=abc"
    #[arg(long)]
    pub cookie: Option<String>,

    /// Assign as the client would: live cookie store and analytics report
    #[arg(long)]
    pub client: bool,

    /// Request header as NAME:VALUE (repeatable)
    #[arg(long = "header", short = 'H', value_name = "NAME:VALUE")]
    pub headers: Vec<String>,

    /// Request path
    #[arg(long, default_value = "/")]
    pub path: String,

    /// Request method
    #[arg(long, default_value = "GET")]
    pub method: String,

    /// Raw query string, e.g. "beta=1&ref=mail"
    #[arg(long)]
    pub query: Option<String>,
}

impl AssignArgs {
    fn environment(&self) -> Environment {
        if self.client {
            Environment::Client
        } else {
            Environment::Server
        }
    }
}

/// Split a `NAME:VALUE` header argument.
pub fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("header '{raw}' must be NAME:VALUE"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("header '{raw}' has an empty name"));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

/// Build the request snapshot the assignment is computed for.
pub fn build_context(args: &AssignArgs) -> Result<RequestContext, String> {
    let mut ctx = match args.environment() {
        Environment::Server => RequestContext::server(),
        Environment::Client => RequestContext::client(),
    }
    .with_method(args.method.to_ascii_uppercase())
    .with_path(args.path.clone());

    if let Some(query) = &args.query {
        ctx = ctx.with_query_string(query);
    }
    for raw in &args.headers {
        let (name, value) = parse_header(raw)?;
        ctx = ctx.with_header(&name, value);
    }
    if let Some(cookie) = &args.cookie {
        ctx = ctx.with_header("cookie", cookie.clone());
    }
    Ok(ctx)
}

fn log_assignment(assignment: &Assignment) {
    match assignment.experiment_id() {
        Some(experiment) => info!(
            experiment,
            variants = ?assignment.variant_indexes,
            "Assigned"
        ),
        None => info!("No experiment assigned"),
    }
}

pub async fn run(config_path: Option<&Path>, args: AssignArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let environment = args.environment();
    let ctx = build_context(&args)?;

    let catalog = CatalogLoader::from_config(&config, environment).load().await;
    debug!(experiments = catalog.len(), environment = environment.as_str(), "Assigning");
    let engine = AssignmentEngine::new(&config.assignment);

    let output = match environment {
        Environment::Server => {
            let mut jar = HeaderCookieJar::from_header(args.cookie.as_deref());
            let assignment = engine.assign(&catalog, &ctx, &mut jar);
            log_assignment(&assignment);
            serde_json::json!({
                "assignment": assignment,
                "setCookie": jar.set_cookie_headers(),
            })
        }
        Environment::Client => {
            let mut jar = DocumentCookieJar::from_document_cookie(args.cookie.as_deref().unwrap_or(""));
            let assignment = engine.assign(&catalog, &ctx, &mut jar);
            log_assignment(&assignment);
            let reported = report_assignment(environment, &assignment, &TracingAnalyticsSink);
            serde_json::json!({
                "assignment": assignment,
                "documentCookie": jar.document_cookie(),
                "analytics": reported,
            })
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_argument_is_split_once() {
        assert_eq!(
            parse_header("User-Agent: Mozilla/5.0 (X11; Linux)").unwrap(),
            ("User-Agent".to_string(), "Mozilla/5.0 (X11; Linux)".to_string())
        );
        assert_eq!(
            parse_header("x-time:12:30").unwrap(),
            ("x-time".to_string(), "12:30".to_string())
        );
        assert!(parse_header("no-colon").is_err());
        assert!(parse_header(": value").is_err());
    }

    #[test]
    fn context_from_arguments() {
        let args = AssignArgs {
            cookie: Some("exp=hero.1; theme=dark".into()),
            headers: vec!["User-Agent: Mobile".into()],
            path: "/shop".into(),
            method: "post".into(),
            query: Some("beta=1".into()),
            ..AssignArgs::default()
        };
        let ctx = build_context(&args).unwrap();
        assert!(ctx.is_server());
        assert_eq!(ctx.method, "POST");
        assert_eq!(ctx.path, "/shop");
        assert_eq!(ctx.header("user-agent"), Some("Mobile"));
        assert_eq!(ctx.query_param("beta"), Some("1"));
        assert_eq!(ctx.cookie("theme"), Some("dark"));
    }

    #[test]
    fn client_flag_selects_client_context() {
        let args = AssignArgs {
            client: true,
            ..AssignArgs::default()
        };
        assert!(!build_context(&args).unwrap().is_server());
    }

    #[derive(Clone, Default)]
    struct Captured(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn logged(assignment: &Assignment) -> String {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        tracing::subscriber::with_default(subscriber, || log_assignment(assignment));
        let bytes = captured.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn assignment_summary_is_logged() {
        let assignment = Assignment {
            experiment_index: Some(0),
            variant_indexes: vec![1, 0],
            experiment: Some(abwright_core::Experiment::new("hero", "hero")),
            ..Assignment::none()
        };
        let line = logged(&assignment);
        assert!(line.contains("Assigned"), "{line}");
        assert!(line.contains("experiment=\"hero\""), "{line}");
        assert!(line.contains("[1, 0]"), "{line}");

        assert!(logged(&Assignment::none()).contains("No experiment assigned"));
    }

    #[test]
    fn bad_header_is_rejected() {
        let args = AssignArgs {
            headers: vec!["broken".into()],
            ..AssignArgs::default()
        };
        assert!(build_context(&args).is_err());
    }
}
