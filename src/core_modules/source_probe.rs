// THEORY:
// The `SourceProbe` answers one question: "what color does this content want to be?"
// It asks the snapshot a fixed series of increasingly indirect questions and stops at
// the first usable answer:
//
// 1.  **Declared hint**: the document said so (`theme-color`). Nothing beats intent.
// 2.  **Header scan**: a banner-like element near the top of the page, big enough to
//     be the site's visual identity rather than a decorative strip.
// 3.  **Page background**: `<body>`, `<html>`, then common main containers.
// 4.  **Icon**: decode the icon and let the `Quantizer` vote.
//
// Key principles:
// - Every host call is bounded by `STEP_TIMEOUT`. A step that times out or errors
//   fails alone; the probe moves on to the next strategy.
// - Finding nothing is a normal outcome (`None`), not an error.
// - The provenance tag is for logs and debugging. No decision reads it.

use crate::core_modules::color_math::{CssColor, parse_css_color};
use crate::core_modules::quantizer::Quantizer;
use crate::core_modules::snapshot::{ContentSnapshot, ElementBox, PageTarget};
use crate::error::{ProbeError, ProbeResult};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Upper bound for any single asynchronous probe step.
pub const STEP_TIMEOUT: Duration = Duration::from_millis(2000);

/// Declared theme directives, most specific first.
pub const THEME_HINT_NAMES: [&str; 2] = ["theme-color", "msapplication-TileColor"];

/// Selectors with "site header/banner" semantics, in priority order.
pub const HEADER_SELECTORS: [&str; 12] = [
    "[role=\"banner\"]",
    "header",
    "nav",
    ".navbar",
    ".header",
    ".top-bar",
    ".site-header",
    ".page-header",
    ".masthead",
    ".banner",
    ".hero",
    ".hero-section",
];

pub const PAGE_TARGETS: [PageTarget; 8] = [
    PageTarget::Body,
    PageTarget::Root,
    PageTarget::Container("main"),
    PageTarget::Container("#main"),
    PageTarget::Container(".main"),
    PageTarget::Container(".container"),
    PageTarget::Container(".wrapper"),
    PageTarget::Container(".page"),
];

const MIN_HEADER_WIDTH: f64 = 100.0;
const MIN_HEADER_HEIGHT: f64 = 30.0;
const MAX_HEADER_TOP: f64 = 200.0;

/// Which strategy produced a color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    DeclaredHint(&'static str),
    Header(&'static str),
    PageBackground(PageTarget),
    Icon,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::DeclaredHint(name) => write!(f, "hint:{name}"),
            Provenance::Header(selector) => write!(f, "header:{selector}"),
            Provenance::PageBackground(target) => write!(f, "background:{target}"),
            Provenance::Icon => f.write_str("icon"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeOutcome {
    pub sample: CssColor,
    pub provenance: Provenance,
}

/// Ordered strategy list over a `ContentSnapshot`.
#[derive(Debug, Clone)]
pub struct SourceProbe {
    quantizer: Quantizer,
    step_timeout: Duration,
}

impl Default for SourceProbe {
    fn default() -> Self {
        Self::new(Quantizer::default(), STEP_TIMEOUT)
    }
}

impl SourceProbe {
    pub fn new(quantizer: Quantizer, step_timeout: Duration) -> Self {
        Self {
            quantizer,
            step_timeout,
        }
    }

    /// Upper bound applied to every single host call.
    pub fn step_timeout(&self) -> Duration {
        self.step_timeout
    }

    /// Runs the strategies in order and returns the first color found.
    pub async fn probe(&self, snapshot: &dyn ContentSnapshot) -> Option<ProbeOutcome> {
        if let Some(outcome) = self.declared_hint(snapshot).await {
            return Some(outcome);
        }
        if let Some(outcome) = self.header_scan(snapshot).await {
            return Some(outcome);
        }
        if let Some(outcome) = self.page_background(snapshot).await {
            return Some(outcome);
        }
        if let Some(outcome) = self.icon(snapshot).await {
            return Some(outcome);
        }
        debug!("no strategy produced a color");
        None
    }

    async fn declared_hint(&self, snapshot: &dyn ContentSnapshot) -> Option<ProbeOutcome> {
        for name in THEME_HINT_NAMES {
            let Some(value) = self
                .bounded("declared hint", snapshot.declared_theme_color(name))
                .await
                .flatten()
            else {
                continue;
            };
            match parse_css_color(&value) {
                Some(sample) => {
                    debug!(hint = name, %value, "declared theme color");
                    return Some(ProbeOutcome {
                        sample,
                        provenance: Provenance::DeclaredHint(name),
                    });
                }
                None => debug!(hint = name, %value, "declared theme color is unparseable"),
            }
        }
        None
    }

    async fn header_scan(&self, snapshot: &dyn ContentSnapshot) -> Option<ProbeOutcome> {
        for selector in HEADER_SELECTORS {
            let Some(elements) = self
                .bounded("header scan", snapshot.query_elements(selector))
                .await
            else {
                continue;
            };
            let found = elements
                .iter()
                .filter(|element| is_header_shaped(element))
                .find_map(|element| opaque_background(element.background.as_deref()));
            if let Some(sample) = found {
                debug!(selector, color = %sample.color, "header background");
                return Some(ProbeOutcome {
                    sample,
                    provenance: Provenance::Header(selector),
                });
            }
        }
        None
    }

    async fn page_background(&self, snapshot: &dyn ContentSnapshot) -> Option<ProbeOutcome> {
        for target in PAGE_TARGETS {
            let background = self
                .bounded("page background", snapshot.background_of(target))
                .await
                .flatten();
            if let Some(sample) = opaque_background(background.as_deref()) {
                debug!(%target, color = %sample.color, "page background");
                return Some(ProbeOutcome {
                    sample,
                    provenance: Provenance::PageBackground(target),
                });
            }
        }
        None
    }

    async fn icon(&self, snapshot: &dyn ContentSnapshot) -> Option<ProbeOutcome> {
        let bytes = self.bounded("icon fetch", snapshot.icon_bytes()).await.flatten()?;

        let quantizer = self.quantizer;
        let decode = async move {
            match tokio::task::spawn_blocking(move || quantizer.decode_and_quantize(&bytes)).await {
                Ok(result) => result,
                Err(join_error) => Err(ProbeError::DecodeFailure(join_error.to_string())),
            }
        };
        let dominant = self.bounded("icon decode", decode).await.flatten()?;

        debug!(color = %dominant.color, luminance = dominant.luminance, "icon dominant color");
        Some(ProbeOutcome {
            sample: CssColor {
                color: dominant.color,
                alpha: 1.0,
            },
            provenance: Provenance::Icon,
        })
    }

    /// Runs one host step under the step timeout. Failures are logged and become `None`.
    async fn bounded<T>(
        &self,
        step: &'static str,
        future: impl Future<Output = ProbeResult<T>>,
    ) -> Option<T> {
        let result = match tokio::time::timeout(self.step_timeout, future).await {
            Ok(result) => result,
            Err(_) => Err(ProbeError::ExtractionTimeout {
                step,
                limit: self.step_timeout,
            }),
        };
        match result {
            Ok(value) => Some(value),
            Err(error) => {
                warn!(step, %error, "probe step failed, falling through");
                None
            }
        }
    }
}

fn is_header_shaped(element: &ElementBox) -> bool {
    element.width >= MIN_HEADER_WIDTH
        && element.height >= MIN_HEADER_HEIGHT
        && element.top <= MAX_HEADER_TOP
}

fn opaque_background(value: Option<&str>) -> Option<CssColor> {
    parse_css_color(value?).filter(|color| !color.is_transparent())
}
