pub mod pulse;

pub use pulse::{NullSink, PulseError, PulseSink, SilentPulse};

#[cfg(feature = "audio-pulse")]
pub use pulse::CpalSink;

/// Default sink for this build: the output device when `audio-pulse` is on.
pub fn default_sink() -> std::sync::Arc<dyn PulseSink> {
    #[cfg(feature = "audio-pulse")]
    {
        std::sync::Arc::new(CpalSink::new())
    }

    #[cfg(not(feature = "audio-pulse"))]
    {
        std::sync::Arc::new(NullSink)
    }
}
