/// Convert the gain control's decibel value to a linear multiplier.
///
/// Quirk: the decibel value is halved before the usual `10^(dB / 20)`
/// amplitude conversion, so +40 dB maps to ×10 and +20 dB to ×√10. The
/// visualizer's gain response depends on this curve; do not replace it
/// with the textbook formula.
#[inline]
pub fn gain_db_to_linear(gain_db: f32) -> f32 {
    10f32.powf((gain_db * 0.5) / 20.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn zero_db_is_unity() {
        assert_eq!(gain_db_to_linear(0.0), 1.0);
    }

    #[test]
    fn decibels_are_halved() {
        assert_relative_eq!(gain_db_to_linear(40.0), 10.0, max_relative = 1e-5);
        assert_relative_eq!(gain_db_to_linear(20.0), 10f32.sqrt(), max_relative = 1e-5);
        assert_relative_eq!(gain_db_to_linear(-40.0), 0.1, max_relative = 1e-5);
    }

    #[test]
    fn values_outside_slider_range_are_not_clamped() {
        assert_relative_eq!(gain_db_to_linear(80.0), 100.0, max_relative = 1e-4);
        assert_relative_eq!(gain_db_to_linear(-20.0), 10f32.powf(-0.5), max_relative = 1e-5);
    }
}
