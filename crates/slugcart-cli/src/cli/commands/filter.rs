use anyhow::Result;

use slugcart_core::config::SeoConfig;
use slugcart_core::filter::SlugFilter;

pub fn run_filter(cfg: &SeoConfig, name: &str) -> Result<()> {
    let filter = SlugFilter::new(cfg)?;
    println!("{}", filter.filter(name));
    Ok(())
}
