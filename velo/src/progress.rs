use indicatif::{ProgressBar, ProgressStyle};
use itslive::{Cancelled, ProgressEvent};

pub fn bar(prefix: String, length: u64) -> ProgressBar {
    let pb = ProgressBar::new(length);
    pb.set_prefix(prefix);
    pb.set_style(
        ProgressStyle::with_template("{prefix}...\n[{wide_bar:.cyan/blue}] {pos}/{len}")
            .expect("incorrect progress bar format string")
            .progress_chars("#>-"),
    );
    pb
}

/// Returns a progress sink driving `pb`.
///
/// Slow geographic conversions are refused unless `confirmed`.
pub fn sink(
    pb: &ProgressBar,
    confirmed: bool,
) -> impl Fn(ProgressEvent) -> Result<(), Cancelled> + Sync + '_ {
    move |event| match event {
        ProgressEvent::LargeGeographicGrid { cells } if !confirmed => {
            pb.suspend(|| {
                eprintln!(
                    "converting {cells} cells to latitude/longitude is slow, pass --yes to continue"
                );
            });
            Err(Cancelled)
        }
        ProgressEvent::LargeGeographicGrid { .. } => Ok(()),
        ProgressEvent::Load { done, total }
        | ProgressEvent::Seed { done, total }
        | ProgressEvent::Point { done, total } => {
            pb.set_length(total as u64);
            pb.set_position(done as u64);
            Ok(())
        }
    }
}
