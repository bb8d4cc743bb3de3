use serde::Serialize;
use std::collections::BTreeSet;
use url::Url;

/// Accumulates every hostname and URL touched during a run.
///
/// Requested entries are recorded before a call is made, response
/// entries from the effective (post-redirect) URL once a round-trip
/// actually happened. The report distinguishes locations that only ever
/// appeared in a response from those we asked for directly.
#[derive(Debug, Default)]
pub struct UrlTracker {
    requested_hostnames: BTreeSet<String>,
    response_hostnames: BTreeSet<String>,
    requested_urls: BTreeSet<String>,
    response_urls: BTreeSet<String>,
}

impl UrlTracker {
    pub fn record_request(&mut self, url: &Url) {
        if let Some(host) = url.host_str() {
            self.requested_hostnames.insert(host.to_owned());
        }
        self.requested_urls.insert(url.to_string());
    }

    pub fn record_response(&mut self, url: &Url) {
        if let Some(host) = url.host_str() {
            self.response_hostnames.insert(host.to_owned());
        }
        self.response_urls.insert(url.to_string());
    }

    pub fn report(&self) -> UrlReport {
        UrlReport {
            requested_hostnames: self.requested_hostnames.clone(),
            response_only_hostnames: self
                .response_hostnames
                .difference(&self.requested_hostnames)
                .cloned()
                .collect(),
            requested_urls: self.requested_urls.clone(),
            response_only_urls: self
                .response_urls
                .difference(&self.requested_urls)
                .cloned()
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UrlReport {
    pub requested_hostnames: BTreeSet<String>,
    pub response_only_hostnames: BTreeSet<String>,
    pub requested_urls: BTreeSet<String>,
    pub response_only_urls: BTreeSet<String>,
}
