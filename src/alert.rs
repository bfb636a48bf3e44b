//! Alert partials for success and error messages.

use maud::{Markup, html};

/// An alert message shown to the user after an action.
#[derive(Debug, Clone, PartialEq)]
pub enum Alert {
    /// The action succeeded.
    Success {
        /// The headline of the alert.
        message: String,
        /// Supporting detail below the headline.
        details: String,
    },
    /// The action failed.
    Error {
        /// The headline of the alert.
        message: String,
        /// Supporting detail below the headline.
        details: String,
    },
}

impl Alert {
    /// Create a success alert.
    pub fn success(message: &str, details: &str) -> Self {
        Alert::Success {
            message: message.to_owned(),
            details: details.to_owned(),
        }
    }

    /// Create an error alert.
    pub fn error(message: &str, details: &str) -> Self {
        Alert::Error {
            message: message.to_owned(),
            details: details.to_owned(),
        }
    }

    /// Render the alert as markup.
    pub fn into_html(self) -> Markup {
        let (container_style, message, details) = match self {
            Alert::Success { message, details } => (
                "p-4 rounded-lg bg-green-50 text-green-800 \
                 dark:bg-gray-800 dark:text-green-400",
                message,
                details,
            ),
            Alert::Error { message, details } => (
                "p-4 rounded-lg bg-red-50 text-red-800 \
                 dark:bg-gray-800 dark:text-red-400",
                message,
                details,
            ),
        };

        html! {
            div id="alert-container" class=(container_style) role="alert"
            {
                p class="text-sm font-medium" { (message) }
                @if !details.is_empty()
                {
                    p class="mt-1 text-sm opacity-80" { (details) }
                }
            }
        }
    }
}

#[cfg(test)]
mod alert_tests {
    use super::Alert;

    #[test]
    fn success_renders_message_and_details() {
        let markup = Alert::success("Import completed", "2 transactions imported").into_html();
        let rendered = markup.into_string();

        assert!(rendered.contains("Import completed"));
        assert!(rendered.contains("2 transactions imported"));
    }

    #[test]
    fn error_without_details_omits_the_details_paragraph() {
        let rendered = Alert::error("Import failed", "").into_html().into_string();

        assert!(rendered.contains("Import failed"));
        assert!(!rendered.contains("opacity-80"));
    }
}
