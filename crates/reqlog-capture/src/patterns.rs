//! URL patterns deciding which outbound requests are of interest
//!
//! A pattern is a plain, case-sensitive substring. It may appear anywhere in
//! the URL (host, path or query string). The first pattern found wins and is
//! recorded as the matched pattern of the capture.

/// Built-in service hostnames and paths monitored unless disabled
pub const DEFAULT_PATTERNS: &[&str] = &[
    "api.mailchimp.com",
    "admin.mailchimp.com",
    "api.2checkout.com",
    "api.paypal.com",
    "api.sandbox.paypal.com",
    "api.mollie.com",
    "www.zohoapis.com",
    "api.dropboxapi.com",
    "api.sendgrid.com",
    "mailgun.net",
    "api.postmarkapp.com",
    "api.getresponse.com",
    "api3.getresponse360.com",
    "www.googleapis.com",
    "api.hubapi.com",
    "api.hsforms.com",
    "api-us1.com",
    "agilecrm.com/dev/api/",
    "api.helpscout.net",
    "api.madmimi.com",
    "app.icontact.com",
    "slack.com/api",
    "api.cc.email",
    // Token refresh goes through the main domain
    "constantcontact.com",
    "api.addpipe.com",
    "www.google.com/recaptcha/api",
    "hooks.zapier.com",
    "gf_check_background_tasks",
    "wp_gf_feed_processor",
    "squareup",
    "maps.googleapis.com/maps/api/place/",
    "challenges.cloudflare.com",
    "gravityapi.com",
    "salesforce.com",
    "connect.mailerlite.com",
    "api.brevo.com",
];

/// Ordered list of patterns
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternSet {
    patterns: Vec<String>,
}

impl PatternSet {
    /// Create a pattern set from an explicit list
    ///
    /// Empty patterns are dropped since they would match every URL.
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(Into::into)
                .filter(|p: &String| !p.is_empty())
                .collect(),
        }
    }

    /// Build the effective list: extras first, then the defaults unless disabled
    pub fn from_settings(extra_patterns: &str, disable_defaults: bool) -> Self {
        let mut patterns = parse_extra_patterns(extra_patterns);

        if !disable_defaults {
            patterns.extend(DEFAULT_PATTERNS.iter().map(|p| p.to_string()));
        }

        Self { patterns }
    }

    /// Return the first pattern contained in `url`
    pub fn matches(&self, url: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|pattern| url.contains(pattern.as_str()))
            .map(String::as_str)
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn into_patterns(self) -> Vec<String> {
        self.patterns
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Split a comma separated pattern string
///
/// All whitespace is removed before splitting, so `"a .io, b.io"` yields
/// `["a.io", "b.io"]`. Empty entries are discarded.
pub fn parse_extra_patterns(raw: &str) -> Vec<String> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();

    compact
        .split(',')
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}
