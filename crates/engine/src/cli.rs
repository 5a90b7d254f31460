//! `itsm-authz` admin command line.
//!
//! Runs against PostgreSQL when `ITSM_DATABASE_URL` is set. Without it every
//! invocation starts from empty in-memory stores, which is only useful for
//! inspecting the role catalog or trying out a check.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use itsm_auth::{Permission, Principal};
use itsm_core::{ResourceRef, TenantId, TenantSettings};
use itsm_infra::{EngineConfig, LogFormat};
use itsm_tenancy::NewTenant;

use crate::Engine;

#[derive(Debug, Parser)]
#[command(name = "itsm-authz", version, about = "ITSM authorization engine administration")]
pub struct Cli {
    /// Log output format; overrides ITSM_LOG_FORMAT.
    #[arg(long, global = true, value_parser = parse_log_format)]
    pub log_format: Option<LogFormat>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List roles, highest level first.
    Roles {
        /// Also list every known permission with its description.
        #[arg(long)]
        permissions: bool,
    },
    /// List tenants, newest first.
    Tenants,
    /// Create a tenant and provision its partition.
    Provision(ProvisionArgs),
    /// Deactivate a tenant.
    Deactivate {
        #[arg(long)]
        tenant: TenantId,
    },
    /// Member and row counts for a tenant.
    Stats {
        #[arg(long)]
        tenant: TenantId,
    },
    /// Grant a role, globally or within a tenant.
    Assign(RoleArgs),
    /// Revoke a role, globally or within a tenant.
    Revoke(RoleArgs),
    /// Evaluate one authorization check and print the decision.
    Check(CheckArgs),
}

#[derive(Debug, Args)]
pub struct ProvisionArgs {
    #[arg(long)]
    pub id: String,
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub description: Option<String>,
    /// User granted `admin` in the new tenant.
    #[arg(long)]
    pub admin: Option<String>,
    #[arg(long)]
    pub domain: Option<String>,
    /// Settings as a JSON object.
    #[arg(long, value_parser = parse_settings)]
    pub settings: Option<TenantSettings>,
}

#[derive(Debug, Args)]
pub struct RoleArgs {
    #[arg(long)]
    pub user: String,
    #[arg(long)]
    pub role: String,
    /// Omit for the global role.
    #[arg(long)]
    pub tenant: Option<TenantId>,
}

#[derive(Debug, Args)]
pub struct CheckArgs {
    #[arg(long)]
    pub user: String,
    #[arg(long)]
    pub department: Option<String>,
    #[arg(long)]
    pub permission: String,
    /// Resource as `type:id`, e.g. `incident:INC-42`.
    #[arg(long, value_parser = parse_resource)]
    pub resource: Option<ResourceRef>,
    #[arg(long)]
    pub tenant: Option<TenantId>,
}

fn parse_log_format(value: &str) -> Result<LogFormat, String> {
    value.parse()
}

fn parse_settings(value: &str) -> Result<TenantSettings, String> {
    serde_json::from_str(value).map_err(|e| format!("settings must be a JSON object: {e}"))
}

fn parse_resource(value: &str) -> Result<ResourceRef, String> {
    ResourceRef::parse(value).map_err(|e| e.to_string())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn run(cli: Cli, config: &EngineConfig) -> Result<()> {
    let engine = Engine::from_config(config)
        .await
        .context("failed to start the engine")?;

    match cli.command {
        Command::Roles { permissions } => {
            print_json(&engine.catalog().list_roles())?;
            if permissions {
                print_json(&engine.catalog().known_permissions())?;
            }
        }
        Command::Tenants => {
            print_json(&engine.provisioner().list_tenants().await?)?;
        }
        Command::Provision(args) => {
            let mut new = NewTenant::new(args.id, args.name);
            new.description = args.description;
            new.admin_username = args.admin;
            new.domain = args.domain;
            new.settings = args.settings;
            print_json(&engine.provisioner().create(new).await?)?;
        }
        Command::Deactivate { tenant } => {
            let affected = engine.provisioner().deactivate(&tenant).await?;
            print_json(&serde_json::json!({ "tenant": tenant, "affected": affected }))?;
        }
        Command::Stats { tenant } => {
            print_json(&engine.provisioner().stats(&tenant).await?)?;
        }
        Command::Assign(args) => {
            let affected = engine
                .memberships()
                .assign(&args.user, &args.role, args.tenant.as_ref())
                .await?;
            print_json(&serde_json::json!({ "affected": affected }))?;
        }
        Command::Revoke(args) => {
            let affected = engine
                .memberships()
                .revoke(&args.user, &args.role, args.tenant.as_ref())
                .await?;
            print_json(&serde_json::json!({ "affected": affected }))?;
        }
        Command::Check(args) => {
            let mut principal = Principal::new(args.user);
            principal.department = args.department;
            let permission = Permission::parse(args.permission)?;
            let decision = engine
                .authorizer()
                .check(&principal, &permission, args.resource.as_ref(), args.tenant.as_ref())
                .await?;
            print_json(&decision)?;
        }
    }

    Ok(())
}
