//! Metrics recording helpers.
//!
//! Thin wrappers over the `metrics` facade so call sites stay one-liners
//! and metric names live in one place.

use metrics::counter;

pub fn record_room_created() {
    counter!("huddle_rooms_created_total").increment(1);
}

pub fn record_room_closed() {
    counter!("huddle_rooms_closed_total").increment(1);
}

pub fn record_participant_joined() {
    counter!("huddle_participants_joined_total").increment(1);
}

pub fn record_participant_left() {
    counter!("huddle_participants_left_total").increment(1);
}

pub fn record_signal_error(kind: &'static str) {
    counter!("huddle_signal_errors_total", "kind" => kind).increment(1);
}
