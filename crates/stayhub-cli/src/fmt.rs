//! Terminal output formatting helpers.

use std::io::{self, Write};

use stayhub_client::chat::{ChatEvent, DeliveryState, LocalMessage};
use stayhub_core::CancellationQuote;
use stayhub_core::models::{Booking, Chat, ChatMessage, Payment, User};

pub fn write_user_status(w: &mut impl Write, user: Option<&User>) -> io::Result<()> {
    let Some(user) = user else {
        return writeln!(w, "Not logged in");
    };
    writeln!(w, "Logged in")?;
    writeln!(w, "  User:     {} (id {})", user.display_name(), user.id)?;
    writeln!(w, "  Email:    {}", user.email)?;
    writeln!(w, "  Role:     {:?}", user.role_type)?;
    Ok(())
}

pub fn write_booking_row(w: &mut impl Write, booking: &Booking) -> io::Result<()> {
    writeln!(
        w,
        "  #{:<6} listing {:<6} {} -> {}  {:>2} night(s)  {:>10.2}  {}",
        booking.id,
        booking.listing_id,
        booking.start_date,
        booking.end_date,
        booking.nights(),
        booking.total_amount,
        booking.status.as_str(),
    )
}

pub fn write_quote(w: &mut impl Write, booking: &Booking, quote: &CancellationQuote) -> io::Result<()> {
    writeln!(w, "  Booking:  #{}", booking.id)?;
    writeln!(w, "  Policy:   {}", quote.policy.label())?;
    writeln!(w, "  Check-in: {} ({} day(s) away)", booking.start_date, quote.days_until_check_in)?;
    writeln!(w, "  Total:    {:.2}", booking.total_amount)?;
    writeln!(w, "  Refund:   {:.2} ({}%)", quote.refund_amount, quote.refund_percentage)?;
    writeln!(w, "  Fee:      {:.2}", quote.cancellation_fee)?;
    if quote.is_free {
        writeln!(w, "  Free cancellation")?;
    }
    Ok(())
}

pub fn write_payment(w: &mut impl Write, payment: &Payment) -> io::Result<()> {
    writeln!(w, "  Payment:  #{} {:?}", payment.id, payment.status)?;
    if let Some(refund) = payment.refund_amount {
        writeln!(w, "  Refunded: {refund:.2}")?;
    }
    Ok(())
}

pub fn write_chat_row(w: &mut impl Write, chat: &Chat, user_id: i64) -> io::Result<()> {
    let unread = if chat.unread_count > 0 {
        format!(" [{} unread]", chat.unread_count)
    } else {
        String::new()
    };
    let preview = chat.last_message.as_deref().unwrap_or("(no messages)");
    writeln!(
        w,
        "  #{:<6} with user {:<6}{unread}  {}",
        chat.id,
        chat.other_participant(user_id),
        truncate(preview, 48),
    )
}

pub fn write_message(w: &mut impl Write, message: &ChatMessage, user_id: i64) -> io::Result<()> {
    let who = if message.sender_id == user_id {
        "me".to_string()
    } else {
        format!("user {}", message.sender_id)
    };
    let read = if message.sender_id == user_id && message.is_read() {
        " (read)"
    } else {
        ""
    };
    writeln!(
        w,
        "[{}] {who}: {}{read}",
        message.created_at.format("%Y-%m-%d %H:%M"),
        message.content,
    )
}

pub fn write_local_message(w: &mut impl Write, local: &LocalMessage, user_id: i64) -> io::Result<()> {
    match local.delivery {
        DeliveryState::Delivered => write_message(w, &local.message, user_id),
        DeliveryState::Sending => {
            writeln!(w, "[sending] me: {}", local.message.content)
        }
        DeliveryState::Failed => writeln!(
            w,
            "[failed] me: {}  (retry with /resend {})",
            local.message.content,
            local.message.correlation_id.as_deref().unwrap_or("?"),
        ),
    }
}

/// Print the events relevant to the chat on screen. Returns `false` for
/// events that were not shown.
pub fn write_event(
    w: &mut impl Write,
    event: &ChatEvent,
    chat_id: i64,
    user_id: i64,
) -> io::Result<bool> {
    match event {
        ChatEvent::MessageAdded { chat_id: id, message } if *id == chat_id => {
            if message.id.is_none() {
                writeln!(w, "[sending] me: {}", message.content)?;
            } else {
                write_message(w, message, user_id)?;
            }
        }
        ChatEvent::MessageConfirmed { chat_id: id, .. } if *id == chat_id => {
            writeln!(w, "  (delivered)")?;
        }
        ChatEvent::MessageFailed {
            chat_id: id,
            correlation_id,
        } if *id == chat_id => {
            writeln!(w, "  (not delivered; retry with /resend {correlation_id})")?;
        }
        ChatEvent::MessagesRead {
            chat_id: id,
            message_ids,
        } if *id == chat_id => {
            writeln!(w, "  ({} message(s) read)", message_ids.len())?;
        }
        ChatEvent::UnreadChanged {
            chat_id: id,
            unread_count,
        } if *id != chat_id && *unread_count > 0 => {
            writeln!(w, "  (chat #{id} has {unread_count} unread)")?;
        }
        ChatEvent::ConnectionChanged { connected } => {
            let state = if *connected { "connected" } else { "offline, reconnecting" };
            writeln!(w, "  ({state})")?;
        }
        _ => return Ok(false),
    }
    Ok(true)
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{cut}...")
}
