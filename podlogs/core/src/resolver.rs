//! Maps requested name fragments onto pods from a single listing snapshot.
//!
//! A fragment matches a pod when it is a substring of the pod name. When
//! several pods match, the first one in listing order wins. The Kubernetes
//! API does not promise a stable listing order, so callers passing short or
//! shared prefixes should expect the selected pod to vary between runs.

use crate::model::PodDescriptor;

/// Result of resolving one fragment against a listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution<'a> {
    Matched {
        fragment: String,
        pod: &'a PodDescriptor,
    },
    NotFound {
        fragment: String,
    },
}

impl Resolution<'_> {
    #[must_use]
    pub fn fragment(&self) -> &str {
        match self {
            Self::Matched { fragment, .. } | Self::NotFound { fragment } => fragment,
        }
    }

    #[must_use]
    pub fn pod(&self) -> Option<&PodDescriptor> {
        match self {
            Self::Matched { pod, .. } => Some(pod),
            Self::NotFound { .. } => None,
        }
    }
}

/// Resolve each fragment to the first pod whose name contains it.
///
/// Fragments are trimmed; blank ones are dropped and produce no result. Every
/// other fragment yields exactly one [`Resolution`], in input order, including
/// duplicates.
#[must_use]
pub fn resolve<'a, F>(fragments: &[F], listing: &'a [PodDescriptor]) -> Vec<Resolution<'a>>
where
    F: AsRef<str>,
{
    fragments
        .iter()
        .map(|fragment| fragment.as_ref().trim())
        .filter(|fragment| !fragment.is_empty())
        .map(|fragment| match matching_pods(fragment, listing).next() {
            Some(pod) => Resolution::Matched {
                fragment: fragment.to_owned(),
                pod,
            },
            None => Resolution::NotFound {
                fragment: fragment.to_owned(),
            },
        })
        .collect()
}

/// Every pod whose name contains `fragment`, in listing order.
pub fn matching_pods<'a>(
    fragment: &str,
    listing: &'a [PodDescriptor],
) -> impl Iterator<Item = &'a PodDescriptor> {
    listing
        .iter()
        .filter(move |pod| pod.name().contains(fragment))
}
