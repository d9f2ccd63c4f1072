/// Re-evaluates `$fut` up to `$attempts` times, sleeping `$delay_secs`
/// between failed attempts. Yields the last error when every attempt fails.
#[macro_export]
macro_rules! retry_async {
    ($attempts:expr, $delay_secs:expr, $fut:expr) => {{
        let attempts: u32 = $attempts;
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match $fut.await {
                Ok(value) => break Ok(value),
                Err(e) if attempt < attempts => {
                    tracing::warn!(
                        "request failed (attempt {}/{}): {}. retrying in {}s",
                        attempt,
                        attempts,
                        e,
                        $delay_secs
                    );
                    tokio::time::sleep(std::time::Duration::from_secs($delay_secs)).await;
                }
                Err(e) => break Err(e),
            }
        }
    }};
}
