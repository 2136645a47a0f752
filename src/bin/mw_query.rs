//! Follow a list query against a live wiki and print what each page held.
//!
//! ```sh
//! export MW_API_URL='https://test.wikipedia.org/w/api.php'
//! # optional: MW_USERNAME/MW_PASSWORD, MW_OAUTH2_ACCESS_TOKEN or MW_OAUTH_* for OAuth 1.0a
//! cargo run --bin mw-query -- allpages 5
//! ```

use busbar_mw_auth::AuthStrategy;
use busbar_mw_bulk::BulkClient;
use busbar_mw_client::CallParams;
use futures::StreamExt;
use tracing_subscriber::EnvFilter;

const DEFAULT_LIST: &str = "allpages";
const DEFAULT_PAGES: usize = 3;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let api_url = std::env::var("MW_API_URL").unwrap_or_else(|_| {
        eprintln!("Error: MW_API_URL environment variable is not set.");
        eprintln!();
        eprintln!("  export MW_API_URL='https://test.wikipedia.org/w/api.php'");
        std::process::exit(1);
    });

    let mut args = std::env::args().skip(1);
    let list = args.next().unwrap_or_else(|| DEFAULT_LIST.to_string());
    let max_pages = match args.next().map(|arg| arg.parse::<usize>()) {
        Some(Ok(pages)) => pages,
        Some(Err(e)) => {
            eprintln!("Error: page count must be a number: {e}");
            std::process::exit(2);
        }
        None => DEFAULT_PAGES,
    };

    let auth = AuthStrategy::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    });
    let logs_in = auth.login_credentials().is_some();

    let bulk = BulkClient::new(&api_url, auth).unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    });

    if logs_in {
        if let Err(e) = bulk.inner().login().await {
            eprintln!("Error: login failed: {e}");
            std::process::exit(1);
        }
        println!("Logged in to {api_url}");
    }

    let query = CallParams::new()
        .with("action", "query")
        .with("list", list.as_str());

    let mut pages = Box::pin(bulk.continued_query_stream(query, Some(max_pages)));
    let mut total = 0;
    let mut count = 0;

    while let Some(page) = pages.next().await {
        count += 1;
        match page {
            Ok(page) => {
                let items = page["query"][list.as_str()]
                    .as_array()
                    .map(Vec::len)
                    .unwrap_or(0);
                total += items;
                println!("  page {count}: {items} {list} entries");
            }
            Err(e) => {
                eprintln!("Error: page {count} failed: {e}");
                std::process::exit(1);
            }
        }
    }

    println!("\n{total} entries over {count} page(s)");
}
