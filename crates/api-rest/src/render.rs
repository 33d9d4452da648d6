//! HTML pages.

use maud::{html, Markup, DOCTYPE};
use summary_core::PatientSummary;

fn layout(title: &str, body: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                title { (title) }
            }
            body { (body) }
        }
    }
}

pub(crate) fn home_page() -> Markup {
    layout(
        "SMART App",
        html! {
            h1 { "Welcome to SMART App" }
            a href="/launch" { "Launch App" }
        },
    )
}

pub(crate) fn error_page(message: &str) -> Markup {
    layout(
        "Something went wrong",
        html! {
            h1 { "Something went wrong" }
            p { (message) }
        },
    )
}

/// Name, patient id and the three lists, in the order the summary holds them.
pub(crate) fn summary_page(summary: &PatientSummary) -> Markup {
    layout(
        summary.display_name(),
        html! {
            h1 { "Hello, " (summary.display_name()) }
            p { "Patient ID: " (summary.patient_id()) }

            h2 { "Conditions" }
            ul #conditions {
                @for condition in summary.conditions() {
                    li { (condition) }
                }
            }

            h2 { "Medications" }
            ul #medications {
                @for medication in summary.medications() {
                    li { (medication) }
                }
            }

            h2 { "Observations" }
            ul #observations {
                @for observation in summary.observations() {
                    li { (observation.label) ": " (observation.display()) }
                }
            }
        },
    )
}
