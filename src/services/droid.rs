use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use scraper::{Html, Selector};
use thirtyfour::{DesiredCapabilities, WebDriver};

// Pages can be arbitrarily large; cap what we hand to the extractor.
const PAGE_TEXT_LIMIT: usize = 12_000;

/// Browser automation seam. One implementation drives one page at a time;
/// callers must not interleave navigations with extractions.
#[async_trait]
pub trait Browser: Send + Sync {
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<()>;
    async fn page_text(&self) -> Result<String>;
}

pub struct Droid {
    driver: WebDriver,
}

impl Droid {
    pub async fn new(webdriver_url: &str) -> Result<Self> {
        let caps = DesiredCapabilities::chrome();
        let driver = WebDriver::new(webdriver_url, caps)
            .await
            .context("Failed to start WebDriver session")?;

        Ok(Droid { driver })
    }

    /// Tear the session down. Always called on campaign exit, success or
    /// failure.
    pub async fn quit(self) -> Result<()> {
        self.driver
            .quit()
            .await
            .context("Failed to close WebDriver session")
    }
}

#[async_trait]
impl Browser for Droid {
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<()> {
        tokio::time::timeout(timeout, self.driver.goto(url))
            .await
            .context("navigation timed out")?
            .context("navigation failed")?;
        Ok(())
    }

    async fn page_text(&self) -> Result<String> {
        let source = self
            .driver
            .source()
            .await
            .context("Failed to read page source")?;
        Ok(visible_text(&source))
    }
}

/// Reduce raw HTML to whitespace-normalized visible text, bounded to
/// [`PAGE_TEXT_LIMIT`] characters.
fn visible_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let body_selector = Selector::parse("body").expect("static selector");

    let text: String = match document.select(&body_selector).next() {
        Some(body) => body.text().collect::<Vec<_>>().join(" "),
        None => document.root_element().text().collect::<Vec<_>>().join(" "),
    };

    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
    normalized.chars().take(PAGE_TEXT_LIMIT).collect()
}

#[cfg(test)]
mod tests {
    use super::visible_text;

    #[test]
    fn visible_text_strips_markup() {
        let html = r#"
            <html>
              <head><title>Acme</title><script>var x = 1;</script></head>
              <body>
                <h1>Acme   Corp</h1>
                <p>Contact us at <a href="mailto:hi@acme.com">hi@acme.com</a></p>
              </body>
            </html>
        "#;
        let text = visible_text(html);

        assert!(text.contains("Acme Corp"));
        assert!(text.contains("hi@acme.com"));
        assert!(!text.contains("var x"));
        assert!(!text.contains("<p>"));
    }
}
