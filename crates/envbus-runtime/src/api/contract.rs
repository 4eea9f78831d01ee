//! Statically declared capability contracts.
//!
//! A capability is a set of `const` descriptors plus an [`ApiContract`]
//! listing their names:
//!
//! ```
//! use envbus_runtime::api::{ApiContract, NotificationMethod, RequestMethod, SharedValue};
//!
//! pub const CONTENT_REQUEST: RequestMethod<(), String> = RequestMethod::new("editor_contentRequest");
//! pub const LOCALE_CHANGE: NotificationMethod<String> = NotificationMethod::new("i18n_localeChange");
//! pub const THEME: SharedValue<String> = SharedValue::new("editor_theme");
//!
//! pub fn contract() -> ApiContract {
//!     ApiContract::new("editor")
//!         .request(&CONTENT_REQUEST)
//!         .notification(&LOCALE_CHANGE)
//!         .shared(&THEME)
//! }
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::marker::PhantomData;

macro_rules! descriptor {
    ($(#[$doc:meta])* $name:ident<$($p:ident),+>) => {
        $(#[$doc])*
        pub struct $name<$($p),+> {
            name: &'static str,
            _marker: PhantomData<fn($($p),+)>,
        }

        impl<$($p),+> $name<$($p),+> {
            pub const fn new(name: &'static str) -> Self {
                Self { name, _marker: PhantomData }
            }

            pub fn name(&self) -> &'static str {
                self.name
            }
        }

        impl<$($p),+> Clone for $name<$($p),+> {
            fn clone(&self) -> Self {
                *self
            }
        }

        impl<$($p),+> Copy for $name<$($p),+> {}

        impl<$($p),+> fmt::Debug for $name<$($p),+> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_tuple(stringify!($name)).field(&self.name).finish()
            }
        }
    };
}

descriptor!(
    /// Remote method taking `A` and answering `R`.
    RequestMethod<A, R>
);
descriptor!(
    /// Fire-and-forget message carrying `A`.
    NotificationMethod<A>
);
descriptor!(
    /// Replicated value of type `T`.
    SharedValue<T>
);

/// Names one side exposes to the other.
#[derive(Debug, Clone, Default)]
pub struct ApiContract {
    name: String,
    requests: BTreeSet<&'static str>,
    notifications: BTreeSet<&'static str>,
    shared: BTreeSet<&'static str>,
}

impl ApiContract {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn request<A, R>(mut self, m: &RequestMethod<A, R>) -> Self {
        self.requests.insert(m.name());
        self
    }

    pub fn notification<A>(mut self, n: &NotificationMethod<A>) -> Self {
        self.notifications.insert(n.name());
        self
    }

    pub fn shared<T>(mut self, s: &SharedValue<T>) -> Self {
        self.shared.insert(s.name());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_request(&self, name: &str) -> bool {
        self.requests.contains(name)
    }

    pub fn has_notification(&self, name: &str) -> bool {
        self.notifications.contains(name)
    }

    pub fn has_shared(&self, name: &str) -> bool {
        self.shared.contains(name)
    }
}
