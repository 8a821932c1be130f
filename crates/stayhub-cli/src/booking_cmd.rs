//! Booking subcommands: list, quote, cancel.

use std::io::{self, Write};

use anyhow::bail;

use stayhub_client::ApiClient;
use stayhub_core::models::{Booking, CancelReason, User};
use stayhub_core::policy::quote_for_code;
use stayhub_core::{CancellationQuote, SystemClock};

use crate::context::CliContext;
use crate::fmt;

/// Booking subcommand actions.
#[derive(clap::Subcommand, Debug)]
pub enum BookingAction {
    /// List bookings made by the signed-in user.
    List,
    /// Show what cancelling a booking would refund right now.
    Quote {
        booking_id: i64,
        /// Quote under this policy tier instead of the listing's (0, 1 or 2).
        #[arg(long)]
        policy: Option<i64>,
        /// Print the quote as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Cancel a booking and request the quoted refund.
    Cancel {
        booking_id: i64,
        /// Reason keyword, e.g. "change of plans" or "other reason".
        #[arg(short, long)]
        reason: String,
        /// Free text for "other reason".
        #[arg(long)]
        detail: Option<String>,
    },
}

/// Execute a booking subcommand.
pub async fn run(action: BookingAction, ctx: &mut CliContext) -> anyhow::Result<()> {
    let user = ctx.require_user()?;
    let api = ctx.api()?;
    match action {
        BookingAction::List => list(ctx, &api, &user).await,
        BookingAction::Quote {
            booking_id,
            policy,
            json,
        } => {
            let booking = find_booking(ctx, &api, &user, booking_id).await?;
            let quote = quote_booking(ctx, &api, &booking, policy).await?;
            let mut out = io::stdout();
            if json {
                writeln!(out, "{}", serde_json::to_string_pretty(&quote)?)?;
            } else {
                fmt::write_quote(&mut out, &booking, &quote)?;
            }
            Ok(())
        }
        BookingAction::Cancel {
            booking_id,
            reason,
            detail,
        } => cancel(ctx, &api, &user, booking_id, &reason, detail.as_deref()).await,
    }
}

async fn list(ctx: &mut CliContext, api: &ApiClient, user: &User) -> anyhow::Result<()> {
    let bookings = ctx.check(api.bookings_for_user(user.id).await)?;
    let mut out = io::stdout();
    if bookings.is_empty() {
        writeln!(out, "No bookings")?;
    }
    for booking in &bookings {
        fmt::write_booking_row(&mut out, booking)?;
    }
    Ok(())
}

async fn find_booking(
    ctx: &mut CliContext,
    api: &ApiClient,
    user: &User,
    booking_id: i64,
) -> anyhow::Result<Booking> {
    let bookings = ctx.check(api.bookings_for_user(user.id).await)?;
    match bookings.into_iter().find(|b| b.id == booking_id) {
        Some(booking) => Ok(booking),
        None => bail!("Booking #{booking_id} not found"),
    }
}

/// Quote under `policy`, or the booked listing's tier when not given.
async fn quote_booking(
    ctx: &mut CliContext,
    api: &ApiClient,
    booking: &Booking,
    policy: Option<i64>,
) -> anyhow::Result<CancellationQuote> {
    let code = match policy {
        Some(code) => code,
        None => ctx.check(api.listing(booking.listing_id).await)?.cancel_policy,
    };
    Ok(quote_for_code(
        code,
        booking.check_in(),
        booking.total_amount,
        &SystemClock,
    )?)
}

async fn cancel(
    ctx: &mut CliContext,
    api: &ApiClient,
    user: &User,
    booking_id: i64,
    reason: &str,
    detail: Option<&str>,
) -> anyhow::Result<()> {
    let booking = find_booking(ctx, api, user, booking_id).await?;
    if !booking.is_cancellable() {
        bail!(
            "Booking #{booking_id} is {} and cannot be cancelled",
            booking.status.as_str()
        );
    }
    let reason = parse_reason(&booking, user.id, reason, detail)?;
    let quote = quote_booking(ctx, api, &booking, None).await?;
    let request = quote.into_request(&reason, user.id);

    let response = ctx.check(api.cancel_booking(booking_id, &request).await)?;
    let mut out = io::stdout();
    writeln!(
        out,
        "Booking #{booking_id} cancelled. Refund: {:.2} ({}%)",
        quote.refund_amount, quote.refund_percentage
    )?;
    if let Some(payment) = &response.payment {
        fmt::write_payment(&mut out, payment)?;
    }
    Ok(())
}

/// Hosts and guests each pick from their own reason list.
fn parse_reason(
    booking: &Booking,
    user_id: i64,
    value: &str,
    detail: Option<&str>,
) -> anyhow::Result<CancelReason> {
    let allowed: &[&str] = if booking.is_host(user_id) {
        &CancelReason::HOST
    } else {
        &CancelReason::GUEST
    };
    let value = value.trim().to_lowercase();
    let known = allowed.contains(&value.as_str()) || value == "other";
    match CancelReason::parse(&value, detail) {
        Some(reason) if known => Ok(reason),
        _ => bail!(
            "Unknown cancel reason '{value}'. Choose one of: {}",
            allowed.join(", ")
        ),
    }
}
