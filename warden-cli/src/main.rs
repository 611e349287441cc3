/*
 * Copyright Warden Contributors
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *      https://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! Thin command-line driver over the `warden-core` engine.
//!
//! Evaluates one request against a policy file and prints `ALLOW` or `DENY`.
//! Parse and per-policy evaluation errors render through miette's reporter
//! on stderr; engine logging is controlled with `RUST_LOG`.

use std::path::{Path, PathBuf};

use clap::Parser;
use miette::{Context, IntoDiagnostic, Report, Result};
use tracing_subscriber::EnvFilter;

use warden_core::ast::EntityUid;
use warden_core::entities::{normalize, Entities};
use warden_core::parser::parse_policy_set;
use warden_core::schema::Schema;
use warden_core::{Authorizer, Decision, Request, Response};

/// A policy-based authorization engine for the Cedar policy language.
#[derive(Debug, Parser)]
#[command(name = "warden", version, about)]
struct Cli {
    /// Policy file to evaluate
    #[arg(long, value_name = "FILE")]
    policies: PathBuf,

    /// Entity fixture JSON (array of {uid, attrs, parents})
    #[arg(long, value_name = "FILE")]
    entities: Option<PathBuf>,

    /// Schema JSON used to normalise entities and context
    #[arg(long, value_name = "FILE")]
    schema: Option<PathBuf>,

    /// Context record JSON for this request
    #[arg(long, value_name = "FILE")]
    context: Option<PathBuf>,

    /// Principal, written as Type::"id"
    #[arg(long, value_name = "ENTITY")]
    principal: String,

    /// Action, written as Type::"id"
    #[arg(long, value_name = "ENTITY")]
    action: String,

    /// Resource, written as Type::"id"
    #[arg(long, value_name = "ENTITY")]
    resource: String,
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .into_diagnostic()
        .with_context(|| format!("reading {}", path.display()))
}

fn parse_uid(text: &str, flag: &str) -> Result<EntityUid> {
    text.parse()
        .into_diagnostic()
        .with_context(|| format!("parsing --{flag}"))
}

fn run(cli: Cli) -> Result<Decision> {
    let policy_text = read_file(&cli.policies)?;
    let policies = parse_policy_set(&cli.policies.display().to_string(), &policy_text)
        .map_err(Report::new)?;

    let schema = cli
        .schema
        .as_deref()
        .map(|path| {
            Schema::from_json_str(&read_file(path)?)
                .into_diagnostic()
                .with_context(|| format!("loading schema {}", path.display()))
        })
        .transpose()?;

    let store = cli
        .entities
        .as_deref()
        .map(|path| {
            Entities::from_json_str(&read_file(path)?, schema.as_ref())
                .into_diagnostic()
                .with_context(|| format!("loading entities {}", path.display()))
        })
        .transpose()?
        .unwrap_or_default();

    let principal = parse_uid(&cli.principal, "principal")?;
    let action = parse_uid(&cli.action, "action")?;
    let resource = parse_uid(&cli.resource, "resource")?;

    let mut request = Request::new(principal.clone(), action.clone(), resource.clone());
    if let Some(path) = cli.context.as_deref() {
        let json: serde_json::Value = serde_json::from_str(&read_file(path)?)
            .into_diagnostic()
            .with_context(|| format!("parsing context {}", path.display()))?;
        let shape = schema
            .as_ref()
            .and_then(|s| s.context_shape(&principal, &action, &resource));
        let context = normalize::value_from_json("context", &json, shape)
            .into_diagnostic()
            .with_context(|| format!("normalising context {}", path.display()))?;
        request = request.with_context(context);
    }

    let Response {
        decision, errors, ..
    } = Authorizer::new().is_authorized(&request, &policies, &store);
    // per-policy errors never change the decision; report them like parse
    // errors, with the offending policy text underlined
    for error in errors {
        eprintln!("{:?}", Report::new(error));
    }
    Ok(decision)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli)? {
        Decision::Allow => println!("ALLOW"),
        Decision::Deny => println!("DENY"),
    }
    Ok(())
}
