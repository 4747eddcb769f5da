//! # CRD Generator
//!
//! Prints the Email and EmailSenderConfig CustomResourceDefinitions as a
//! multi-document YAML stream.
//!
//! ## Usage
//!
//! ```bash
//! # Generate CRD YAML
//! cargo run --bin crdgen > config/crd/email-dispatch.yaml
//!
//! # Generate and apply directly
//! cargo run --bin crdgen | kubectl apply -f -
//! ```

use email_dispatch_controller::crd::{Email, EmailSenderConfig};
use kube::core::CustomResourceExt;

fn main() {
    let documents = [Email::crd(), EmailSenderConfig::crd()]
        .iter()
        .map(serde_yaml::to_string)
        .collect::<Result<Vec<_>, _>>();

    match documents {
        Ok(documents) => {
            for document in documents {
                print!("---\n{document}");
            }
        }
        Err(e) => {
            eprintln!("Failed to serialize CRD to YAML: {e}");
            std::process::exit(1);
        }
    }
}
