//! Interrupt handling.

use futures::stream::{self, BoxStream};
use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::output::print_warning;

/// Ctrl-C presses as a stream. Ends if the signal handler cannot be installed.
pub fn ctrl_c_presses() -> BoxStream<'static, ()> {
    stream::unfold((), |_| async {
        tokio::signal::ctrl_c().await.ok().map(|_| ((), ()))
    })
    .boxed()
}

/// Cancel `cancel` on the first interrupt.
///
/// Returns `true` on a second interrupt, after which the caller should exit
/// without waiting for the current batch. Returns `false` if the interrupts
/// end first.
pub async fn watch_interrupts<S>(mut interrupts: S, cancel: CancellationToken) -> bool
where
    S: Stream<Item = ()> + Unpin,
{
    if interrupts.next().await.is_none() {
        return false;
    }
    print_warning("Interrupt received, finishing the current batch (press Ctrl-C again to quit)");
    cancel.cancel();

    interrupts.next().await.is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_second_interrupt_forces_exit() {
        let cancel = CancellationToken::new();
        let forced = watch_interrupts(stream::iter(vec![(), ()]), cancel.clone()).await;

        assert!(forced);
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_single_interrupt_only_cancels() {
        let cancel = CancellationToken::new();
        let forced = watch_interrupts(stream::iter(vec![()]), cancel.clone()).await;

        assert!(!forced);
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_no_interrupt() {
        let cancel = CancellationToken::new();
        let forced = watch_interrupts(stream::empty::<()>(), cancel.clone()).await;

        assert!(!forced);
        assert!(!cancel.is_cancelled());
    }
}
