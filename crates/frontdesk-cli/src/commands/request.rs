//! Request command implementation.

use anyhow::{Context as _, Result, anyhow};
use clap::Args;

use frontdesk::ApiRequest;
use frontdesk::pipeline::ApiResponse;

use crate::context::Context;
use crate::output;

#[derive(Args, Debug)]
pub struct RequestArgs {
    /// HTTP method (GET, POST, PUT, PATCH, DELETE)
    pub method: String,

    /// Path relative to the API base URL (e.g., /api/hotels)
    pub path: String,

    /// JSON request body
    #[arg(long)]
    pub data: Option<String>,

    /// Query parameter as key=value (repeatable)
    #[arg(long = "query", value_name = "KEY=VALUE")]
    pub query: Vec<String>,

    /// Send without the access token
    #[arg(long)]
    pub exempt: bool,
}

pub async fn run(ctx: &Context, args: RequestArgs) -> Result<()> {
    let client = ctx.client()?;
    let request = build_request(&args)?;

    let response = client.execute(request).await.context("Request failed")?;
    print_body(&response)
}

fn build_request(args: &RequestArgs) -> Result<ApiRequest> {
    let method = args
        .method
        .to_ascii_uppercase()
        .parse()
        .map_err(|_| anyhow!("Invalid HTTP method: {}", args.method))?;

    let mut request = ApiRequest::new(method, args.path.as_str());

    for pair in &args.query {
        let (key, value) = pair
            .split_once('=')
            .with_context(|| format!("Invalid query parameter '{}', expected KEY=VALUE", pair))?;
        request = request.query(key, value);
    }

    if let Some(data) = &args.data {
        let body: serde_json::Value = serde_json::from_str(data).context("Invalid JSON body")?;
        request = request.json(&body)?;
    }

    if args.exempt {
        request = request.exempt();
    }

    Ok(request)
}

fn print_body(response: &ApiResponse) -> Result<()> {
    if response.is_empty() {
        return Ok(());
    }

    match response.json::<serde_json::Value>() {
        Ok(value) => output::json_pretty(&value),
        Err(_) => {
            println!("{}", response.text());
            Ok(())
        }
    }
}
