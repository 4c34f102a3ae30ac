//! Raw SQL commands - query, exec and scalar
//!
//! Statements use `:name` placeholders bound from repeated `-p name=value`
//! flags. Values are typed by their text: integers, floats, `true`/`false`
//! and `null` are recognised, anything else binds as text. Wrap a value in
//! single quotes to force text (`-p code='007'`).

use anyhow::{Context, Result};
use clap::Args;
use dbgate_core::{DataServices, Page, Params, Value};
use tracing::debug;

#[derive(Args, Debug)]
pub struct SqlArgs {
    /// SQL text with :name placeholders
    pub sql: String,

    /// Named parameter as name=value (repeatable)
    #[arg(short = 'p', long = "param", value_name = "NAME=VALUE", value_parser = parse_param)]
    pub params: Vec<(String, Value)>,
}

impl SqlArgs {
    fn params(&self) -> Option<Params> {
        if self.params.is_empty() {
            return None;
        }
        Some(self.params.iter().cloned().collect())
    }
}

#[derive(Args, Debug)]
pub struct QueryArgs {
    #[command(flatten)]
    pub sql: SqlArgs,

    /// Rows to skip before printing
    #[arg(long, default_value_t = 0)]
    pub skip: u64,

    /// Maximum number of rows to print
    #[arg(long)]
    pub take: Option<u64>,
}

impl QueryArgs {
    fn page(&self) -> Page {
        match self.take {
            Some(take) => Page::new(self.skip, take),
            None => Page::skip(self.skip),
        }
    }
}

pub async fn run_query(services: &DataServices, args: &QueryArgs) -> Result<()> {
    let params = args.sql.params();
    let mut session = services.factory().open_session().await?;
    let records = session
        .query_records(&args.sql.sql, params.as_ref(), args.page())
        .await
        .context("Query failed")?;
    debug!(rows = records.len(), "query complete");

    for record in &records {
        println!("{}", serde_json::to_string(record)?);
    }
    Ok(())
}

pub async fn run_exec(services: &DataServices, args: &SqlArgs) -> Result<()> {
    let params = args.params();
    let mut session = services.factory().open_session().await?;
    let mut tx = session.begin().await?;
    let affected = tx
        .execute(&args.sql, params.as_ref())
        .await
        .context("Statement failed")?;
    tx.commit().await?;

    println!("{affected}");
    Ok(())
}

pub async fn run_scalar(services: &DataServices, args: &SqlArgs) -> Result<()> {
    let params = args.params();
    let mut session = services.factory().open_session().await?;
    let value: Value = session
        .scalar(&args.sql, params.as_ref())
        .await
        .context("Scalar query failed")?;

    println!("{value}");
    Ok(())
}

/// Parse `name=value` into a typed parameter.
fn parse_param(raw: &str) -> Result<(String, Value), String> {
    let (name, text) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{raw}'"))?;
    let name = name.trim().trim_start_matches(':');
    if name.is_empty() {
        return Err(format!("missing parameter name in '{raw}'"));
    }
    Ok((name.to_owned(), typed_value(text)))
}

fn typed_value(text: &str) -> Value {
    if let Some(quoted) = text
        .strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
    {
        return Value::Text(quoted.to_owned());
    }
    if text.eq_ignore_ascii_case("null") {
        return Value::Null;
    }
    if let Ok(b) = text.parse::<bool>() {
        return Value::Bool(b);
    }
    if let Ok(i) = text.parse::<i64>() {
        return Value::Int(i);
    }
    match text.parse::<f64>() {
        Ok(x) if x.is_finite() => Value::Float(x),
        _ => Value::Text(text.to_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_are_typed_by_text() {
        assert_eq!(parse_param("n=42").unwrap(), ("n".into(), Value::Int(42)));
        assert_eq!(parse_param("x=2.5").unwrap(), ("x".into(), Value::Float(2.5)));
        assert_eq!(parse_param("ok=true").unwrap(), ("ok".into(), Value::Bool(true)));
        assert_eq!(parse_param("gone=NULL").unwrap(), ("gone".into(), Value::Null));
        assert_eq!(
            parse_param("name=Alice").unwrap(),
            ("name".into(), Value::Text("Alice".into()))
        );
    }

    #[test]
    fn quoted_values_stay_text() {
        assert_eq!(
            parse_param("code='007'").unwrap(),
            ("code".into(), Value::Text("007".into()))
        );
        assert_eq!(
            parse_param("word=inf").unwrap(),
            ("word".into(), Value::Text("inf".into()))
        );
    }

    #[test]
    fn value_may_contain_equals_and_name_may_carry_colon() {
        assert_eq!(
            parse_param(":expr=a=b").unwrap(),
            ("expr".into(), Value::Text("a=b".into()))
        );
        assert_eq!(parse_param("empty=").unwrap().1, Value::Text(String::new()));
    }

    #[test]
    fn malformed_params_are_rejected() {
        assert!(parse_param("novalue").is_err());
        assert!(parse_param("=5").is_err());
    }

    #[test]
    fn take_and_skip_build_the_page() {
        let args = QueryArgs {
            sql: SqlArgs {
                sql: "SELECT 1".into(),
                params: Vec::new(),
            },
            skip: 5,
            take: Some(10),
        };
        assert_eq!(args.page(), Page::new(5, 10));

        let all = QueryArgs { take: None, skip: 0, ..args };
        assert!(all.page().is_all());
    }
}
