//! Subscription Trigger - One-shot Channel Request
//!
//! Fires once, when the transport reports it is open (and logged on,
//! for the session-oriented transport). Send failure is fatal for the
//! session and is not retried.

use tracing::{error, info};

use crate::domain::error::FeedError;
use crate::domain::subscription::SubscriptionRequest;
use crate::ports::transport::FeedTransport;

pub struct SubscriptionTrigger {
  request: SubscriptionRequest,
  fired: bool,
}

impl SubscriptionTrigger {
  pub const fn new(request: SubscriptionRequest) -> Self {
    Self {
      request,
      fired: false,
    }
  }

  /// Send the subscription request through `transport`.
  ///
  /// # Errors
  /// `AlreadySubscribed` on a second call; otherwise whatever the
  /// transport returned from the send.
  pub async fn on_connected<T>(&mut self, transport: &mut T) -> Result<(), FeedError>
  where
    T: FeedTransport + ?Sized,
  {
    if self.fired {
      return Err(FeedError::AlreadySubscribed);
    }
    self.fired = true;

    match transport.send_subscription(&self.request).await {
      Ok(()) => {
        info!(
          transport = %transport.kind(),
          channel = self.request.channel(),
          products = ?self.request.product_ids(),
          "Subscription sent"
        );
        Ok(())
      }
      Err(e) => {
        error!(error = %e, channel = self.request.channel(), "Subscription send failed");
        Err(e)
      }
    }
  }
}
