//! Operator-mode CLI handlers for `hearth auth` subcommands: service
//! authorization registration, balance inspection, manual deduction, and
//! the window-status refresh.

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use hearth_core::authz::{AllowAll, CallerContext};
use hearth_core::ledger;
use hearth_db::models::ServiceAuthorization;
use hearth_db::queries::authorizations::NewAuthorization;

use crate::AuthCommands;

// -----------------------------------------------------------------------
// Public entry point
// -----------------------------------------------------------------------

/// Dispatch an `AuthCommands` variant to the appropriate handler.
pub async fn run_auth_command(
    command: AuthCommands,
    pool: &PgPool,
    ctx: &CallerContext,
) -> Result<()> {
    match command {
        AuthCommands::Create {
            client_id,
            payer,
            service_code,
            units,
            starts,
            ends,
        } => {
            let client_id = parse_uuid(&client_id, "client ID")?;
            let starts_on = parse_date(&starts)?;
            let ends_on = parse_date(&ends)?;

            let auth = ledger::create_authorization(
                pool,
                &AllowAll,
                ctx,
                NewAuthorization {
                    organization_id: ctx.organization_id,
                    client_id,
                    payer,
                    service_code,
                    authorized_units: units,
                    starts_on,
                    ends_on,
                },
            )
            .await?;

            println!("Authorization created.");
            println!();
            print_authorization(&auth);
            Ok(())
        }
        AuthCommands::Show { authorization_id } => {
            let id = parse_uuid(&authorization_id, "authorization ID")?;
            let auth = ledger::get_authorization(pool, &AllowAll, ctx, id).await?;
            print_authorization(&auth);
            Ok(())
        }
        AuthCommands::List { client_id } => cmd_list(pool, ctx, &client_id).await,
        AuthCommands::Deduct {
            authorization_id,
            units,
        } => {
            let id = parse_uuid(&authorization_id, "authorization ID")?;
            let auth = ledger::deduct_units(pool, &AllowAll, ctx, id, units).await?;
            println!(
                "Deducted {units} unit(s); {} of {} remaining.",
                auth.units_remaining, auth.authorized_units
            );
            Ok(())
        }
        AuthCommands::Refresh => {
            let updated = ledger::refresh_statuses(pool, Utc::now().date_naive()).await?;
            println!("Refreshed {updated} authorization status(es).");
            Ok(())
        }
    }
}

fn parse_uuid(input: &str, what: &str) -> Result<Uuid> {
    Uuid::parse_str(input).with_context(|| format!("invalid {what}: {input:?}"))
}

fn parse_date(input: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .with_context(|| format!("invalid date {input:?}, expected YYYY-MM-DD"))
}

// -----------------------------------------------------------------------
// hearth auth list <client-id>
// -----------------------------------------------------------------------

/// List a client's authorizations, soonest-expiring first.
async fn cmd_list(pool: &PgPool, ctx: &CallerContext, client_id: &str) -> Result<()> {
    let client_id = parse_uuid(client_id, "client ID")?;
    let auths = ledger::list_for_client(pool, &AllowAll, ctx, client_id).await?;

    if auths.is_empty() {
        println!("No authorizations found for client {client_id}.");
        return Ok(());
    }

    let id_w = 36;
    let code_w = 7;
    let status_w = 13;

    println!(
        "{:<id_w$}  {:<code_w$}  {:<status_w$}  {:>10}  WINDOW",
        "ID", "CODE", "STATUS", "REMAINING",
    );
    for auth in &auths {
        println!(
            "{:<id_w$}  {:<code_w$}  {:<status_w$}  {:>5}/{:<4}  {} to {}",
            auth.id,
            auth.service_code,
            auth.status,
            auth.units_remaining,
            auth.authorized_units,
            auth.starts_on,
            auth.ends_on,
        );
    }

    Ok(())
}

fn print_authorization(auth: &ServiceAuthorization) {
    println!("  ID:        {}", auth.id);
    println!("  Client:    {}", auth.client_id);
    println!("  Payer:     {}", auth.payer);
    println!("  Code:      {}", auth.service_code);
    println!("  Status:    {}", auth.status);
    println!(
        "  Units:     {} used, {} remaining of {}",
        auth.units_used, auth.units_remaining, auth.authorized_units
    );
    println!("  Window:    {} to {}", auth.starts_on, auth.ends_on);
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_date_rejects_non_iso() {
        assert!(parse_date("2025-06-03").is_ok());
        assert!(parse_date("June 3 2025").is_err());
    }
}
