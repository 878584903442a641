use std::{future::Future, time::Duration};

use tokio_util::sync::CancellationToken;

use crate::{errors::Error, Result};

// ============== Cancellation Helpers ==============

/// Race `fut` against `cancel`.
///
/// Cancellation wins ties so a cancelled flow never starts new remote work.
pub async fn run_cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        out = fut => out,
    }
}

/// Sleep for `delay` unless cancelled first.
pub async fn sleep_cancellable(cancel: &CancellationToken, delay: Duration) -> Result<()> {
    run_cancellable(cancel, async {
        tokio::time::sleep(delay).await;
        Ok(())
    })
    .await
}

/// Short type name for logs (`a::b::Foo<c::Bar>` -> `Foo<Bar>`).
pub fn short_type_name(full: &str) -> String {
    let mut out = String::with_capacity(full.len());
    let mut segment = String::new();
    for ch in full.chars() {
        match ch {
            '<' | '>' | ',' | ' ' | '&' | '(' | ')' | '[' | ']' => {
                out.push_str(last_path_segment(&segment));
                segment.clear();
                out.push(ch);
            }
            _ => segment.push(ch),
        }
    }
    out.push_str(last_path_segment(&segment));
    out
}

fn last_path_segment(path: &str) -> &str {
    path.rsplit("::").next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_type_name_strips_module_paths() {
        assert_eq!(short_type_name("a::b::Foo"), "Foo");
        assert_eq!(short_type_name("a::Foo<b::c::Bar>"), "Foo<Bar>");
        assert_eq!(short_type_name("Plain"), "Plain");
    }

    #[tokio::test]
    async fn run_cancellable_returns_cancelled_when_token_already_fired() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let out = run_cancellable(&cancel, async { Ok(1) }).await;
        assert!(matches!(out, Err(Error::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_cancellable_stops_early_on_cancel() {
        let cancel = CancellationToken::new();
        let c2 = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            c2.cancel();
        });
        let out = sleep_cancellable(&cancel, Duration::from_secs(60)).await;
        assert!(matches!(out, Err(Error::Cancelled)));
    }

    #[tokio::test]
    async fn run_cancellable_passes_through_result() {
        let cancel = CancellationToken::new();
        let out = run_cancellable(&cancel, async { Ok::<_, Error>("ok") }).await;
        assert_eq!(out.unwrap(), "ok");
    }
}
