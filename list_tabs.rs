use pagepeek::browser::CdpTabService;
use pagepeek::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load(None)?;
    println!(
        "Fetching list of open tabs from {}:{}...",
        config.browser.host, config.browser.port
    );

    let pages = CdpTabService::new(&config.browser).list_pages().await?;
    if pages.is_empty() {
        println!("No page targets open.");
    }
    for (i, target) in pages.iter().enumerate() {
        let marker = if i == 0 { " (active)" } else { "" };
        println!("Tab [{}]{}:", i, marker);
        println!("  Id: {}", target.id);
        println!("  Title: {}", target.title);
        println!("  URL: {}", target.url);
        println!("---");
    }

    Ok(())
}
