//! JavaScript snippets evaluated against a live, rendered `Page`.
//!
//! Everything that can be read straight from the fetched HTML goes through
//! `scraper` instead (see `extractors.rs`); these two scripts are the only
//! signals that genuinely need a painted page.

/// Navigation-timing readout.
pub const TIMING_SCRIPT: &str = r"
    (() => {
        const timing = performance.timing || {};
        const nav = performance.getEntriesByType('navigation')[0] || {};

        return {
            navigation_start: timing.navigationStart || nav.startTime || 0,
            dom_complete: timing.domComplete || nav.domComplete || 0,
            load_complete: timing.loadEventEnd || nav.loadEventEnd || 0,
            first_paint: null,
            first_contentful_paint: null,
            largest_contentful_paint: null
        };
    })()
";

/// Live security-surface readout (HTTPS, CSP, framing headers exposed as meta tags).
pub const SECURITY_SCRIPT: &str = r#"
    (() => {
        const url = new URL(window.location.href);
        return {
            https: url.protocol === 'https:',
            hsts: url.protocol === 'https:' &&
                document.querySelector('meta[http-equiv="Strict-Transport-Security"]') !== null,
            csp: document.querySelector('meta[http-equiv="Content-Security-Policy"]')?.content || null,
            x_frame_options: document.querySelector('meta[http-equiv="X-Frame-Options"]')?.content || null,
            permissions_policy: document.querySelector('meta[http-equiv="Permissions-Policy"]')?.content || null
        };
    })()
"#;
