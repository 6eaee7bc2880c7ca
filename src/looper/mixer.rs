use crate::looper::buffer::limit;
use crate::looper::group::GroupSet;
use crate::looper::track::Track;

/// Sum the active group's audible tracks at their current positions into
/// `out_l`/`out_r`, then add the live input. Every accumulation step runs
/// through the limiter so the output magnitude stays bounded.
///
/// `in_r` is `None` for a mono source; the left mix then feeds both
/// output channels. Tracks that have run past their end without repeat
/// are skipped silently.
#[allow(clippy::too_many_arguments)]
pub fn mix(
    tracks: &[Track],
    groups: &GroupSet,
    group: usize,
    in_l: &[f32],
    in_r: Option<&[f32]>,
    out_l: &mut [f32],
    out_r: &mut [f32],
    n: usize,
) {
    for s in 0..n {
        let mut sum_l = 0.0f32;
        let mut sum_r = 0.0f32;

        for t in groups.tracks(group) {
            let track = &tracks[t];
            if !track.is_audible() {
                continue;
            }
            if let Some(idx) = track.play_index(s) {
                let (l, r) = track.frame(idx);
                sum_l = limit(sum_l + l);
                sum_r = limit(sum_r + r);
            }
        }

        sum_l = limit(sum_l + in_l[s]);
        sum_r = match in_r {
            Some(r) => limit(sum_r + r[s]),
            // Simulated mono: the left signal feeds both sides
            None => limit(sum_r + in_l[s]),
        };

        out_l[s] = sum_l;
        out_r[s] = sum_r;
    }
}
