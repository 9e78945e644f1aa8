#![cfg(test)]

mod reading_tests {
    use oracle_core::reading::{Reading, ReadingValue, SensorType, Unit};

    fn sample() -> Reading {
        Reading {
            sensor_id: "temp-0".into(),
            sensor_type: SensorType::Temperature,
            value: ReadingValue::Scalar(23.1),
            unit: Unit::Celsius,
            timestamp: 1_000,
            node_id: "node-a".into(),
            signature: vec![0xab, 0xcd],
            quality_score: 0.9,
        }
    }

    mod window_membership {
        use super::*;

        #[test]
        fn inside_bounds_should_be_within_window() {
            let r = sample();
            assert!(r.within_window(900, 1_100, 5));
        }

        #[test]
        fn within_skew_before_start_should_be_within_window() {
            let mut r = sample();
            r.timestamp = 996;
            assert!(r.within_window(1_000, 1_100, 5));
        }

        #[test]
        fn beyond_skew_after_end_should_not_be_within_window() {
            let mut r = sample();
            r.timestamp = 1_110;
            assert!(!r.within_window(1_000, 1_100, 5));
        }
    }

    mod validation {
        use super::*;

        #[test]
        fn well_formed_reading_should_pass() {
            assert!(sample().validate_shape().is_ok());
        }

        #[test]
        fn empty_sensor_id_should_fail() {
            let mut r = sample();
            r.sensor_id.clear();
            assert!(r.validate_shape().is_err());
        }

        #[test]
        fn quality_score_above_one_should_fail() {
            let mut r = sample();
            r.quality_score = 1.5;
            assert!(r.validate_shape().is_err());
        }
    }

    mod signing_bytes {
        use super::*;

        #[test]
        fn should_be_stable_across_signature_changes() {
            let mut r = sample();
            let a = r.signing_bytes();
            r.signature = vec![1, 2, 3];
            let b = r.signing_bytes();
            assert_eq!(a, b, "signature bytes must not affect the signed payload");
        }

        #[test]
        fn should_differ_for_different_values() {
            let r1 = sample();
            let mut r2 = sample();
            r2.value = ReadingValue::Scalar(99.0);
            assert_ne!(r1.signing_bytes(), r2.signing_bytes());
        }
    }

    mod serde_roundtrip {
        use super::*;

        #[test]
        fn hex_signature_should_roundtrip() {
            let r = sample();
            let json = serde_json::to_string(&r).unwrap();
            let parsed: Reading = serde_json::from_str(&json).unwrap();
            assert_eq!(parsed.signature, r.signature);
        }

        #[test]
        fn gps_value_should_roundtrip() {
            let mut r = sample();
            r.value = ReadingValue::Gps { lat: 1.0, lon: 2.0, alt: 3.0, accuracy: 4.0 };
            let json = serde_json::to_string(&r).unwrap();
            let parsed: Reading = serde_json::from_str(&json).unwrap();
            assert_eq!(parsed.value, r.value);
        }
    }
}

mod error_tests {
    use oracle_core::error::OracleError;

    #[test]
    fn fatal_should_not_be_soft() {
        let err = OracleError::fatal("corrupt reputation store");
        assert!(!err.is_soft());
    }

    #[test]
    fn insufficient_contributors_should_be_soft() {
        let err = OracleError::InsufficientContributors { participants: 2, min_nodes: 3 };
        assert!(err.is_soft());
        assert!(err.to_string().contains("2"));
        assert!(err.to_string().contains('3'));
    }

    #[test]
    fn validation_error_should_convert() {
        let v = oracle_core::validation::ValidationError::required("sensor_id");
        let err: OracleError = v.into();
        assert!(matches!(err, OracleError::Validation(_)));
    }
}
