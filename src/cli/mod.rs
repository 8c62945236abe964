//! Command-line interface definitions for the `tiller` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::Parser;

/// Top-level CLI for the `tiller` binary.
#[derive(Debug, Parser)]
#[command(
    name = "tiller",
    about = "Converge remote REST resources towards declarative manifests",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// Show the changes a manifest would apply, without mutating anything.
    #[command(name = "plan", about = "Preview the changes a manifest would apply")]
    Plan(ManifestCommand),
    /// Create or update a resource so it matches its manifest.
    #[command(name = "apply", about = "Converge a resource to its manifest")]
    Apply(ManifestCommand),
    /// Delete a resource and forget its recorded state.
    #[command(name = "destroy", about = "Delete a resource and its recorded state")]
    Destroy(ResourceCommand),
    /// Adopt an existing remote resource without creating anything.
    #[command(name = "import", about = "Adopt an existing remote resource")]
    Import(ImportCommand),
}

/// Arguments shared by the `plan` and `apply` subcommands.
#[derive(Debug, Parser)]
pub(crate) struct ManifestCommand {
    /// Resource type, for example `dns-policy`.
    #[arg(value_name = "TYPE")]
    pub(crate) resource_type: String,
    /// Logical name the resource is tracked under locally.
    #[arg(value_name = "NAME")]
    pub(crate) name: String,
    /// Path to the JSON manifest describing the desired state.
    #[arg(long, value_name = "PATH")]
    pub(crate) file: String,
}

/// Arguments for the `tiller destroy` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct ResourceCommand {
    /// Resource type, for example `dns-policy`.
    #[arg(value_name = "TYPE")]
    pub(crate) resource_type: String,
    /// Logical name the resource is tracked under locally.
    #[arg(value_name = "NAME")]
    pub(crate) name: String,
}

/// Arguments for the `tiller import` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct ImportCommand {
    /// Resource type, for example `dns-policy`.
    #[arg(value_name = "TYPE")]
    pub(crate) resource_type: String,
    /// Logical name to track the adopted resource under locally.
    #[arg(value_name = "NAME")]
    pub(crate) name: String,
    /// Opaque import id, for example `projects/myproj/policies/mypolicy`.
    #[arg(value_name = "ID")]
    pub(crate) id: String,
}
