//! Publisher and data point behaviour through the public API

#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

mod support;

use std::sync::Arc;
use std::time::Duration;

use hpknx::core::datapoint::{DataPoint, DataPointOptions};
use hpknx::core::publisher::{PublisherConfig, LOGIN_INTERVAL};
use hpknx::core::value::{ChangeRule, NumericType, ValueKind};
use hpknx::{Publisher, Registry, Value};

use support::{bus, ga, gateway_config, heat_pump};

fn publisher_config(update_secs: u64) -> PublisherConfig {
    PublisherConfig {
        login_interval: LOGIN_INTERVAL,
        update_interval: Duration::from_secs(update_secs),
        cyclic_sending_interval: Duration::from_secs(600),
        tick_timeout: None,
    }
}

#[tokio::test]
async fn test_update_tick_with_single_point() {
    let hp = heat_pump();
    let bus = bus();
    hp.set_value("P1", Value::Numeric(42.0));

    let mut registry = Registry::new();
    let p1 = registry
        .add_data_point(
            DataPoint::new(
                "P1",
                ga("3/1/1"),
                ValueKind::Numeric(NumericType::Power),
                DataPointOptions {
                    on_change: Some(ChangeRule::Absolute(5.0)),
                    ..Default::default()
                },
                hp.clone(),
                bus.clone(),
            )
            .unwrap(),
        )
        .unwrap();

    let publisher = Publisher::new(Arc::new(registry), hp.clone(), publisher_config(60));
    let report = publisher.run_update_cycle().await;

    assert_eq!(report.values_sent, 1);
    assert_eq!(p1.current_value().await, Some(Value::Numeric(42.0)));
    assert_eq!(p1.last_sent_value().await, Some(Value::Numeric(42.0)));
    assert_eq!(bus.sent().len(), 1);
    assert_eq!(bus.sent_values(ga("3/1/1")), vec![Value::Numeric(42.0)]);
}

#[tokio::test]
async fn test_cyclic_tick_only_sends_cyclic_points() {
    let config = gateway_config();
    let hp = heat_pump();
    let bus = bus();
    let registry = Arc::new(Registry::build(&config, hp.clone(), bus.clone()).unwrap());
    let publisher = Publisher::new(registry, hp.clone(), publisher_config(30));

    // nothing polled yet
    assert_eq!(publisher.run_cyclic_sending().await, 0);

    publisher.run_update_cycle().await;
    bus.clear_sent();
    assert_eq!(publisher.run_cyclic_sending().await, 1);
    assert_eq!(bus.sent_values(ga("1/2/2")), vec![Value::Numeric(20.0)]);
    assert!(!bus.sent()[0].is_response);
}

#[tokio::test]
async fn test_partial_query_leaves_missing_points_untouched() {
    let config = gateway_config();
    let hp = heat_pump();
    let bus = bus();
    hp.remove_value("Verdichter");
    let registry = Arc::new(Registry::build(&config, hp.clone(), bus.clone()).unwrap());
    let publisher = Publisher::new(registry.clone(), hp.clone(), publisher_config(30));

    let report = publisher.run_update_cycle().await;
    assert_eq!(report.values_received, 2);
    assert_eq!(report.errors, 0);
    assert_eq!(
        registry.data_point("Verdichter").unwrap().current_value().await,
        None
    );
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let config = gateway_config();
    let hp = heat_pump();
    let registry = Arc::new(Registry::build(&config, hp.clone(), bus()).unwrap());
    let mut publisher = Publisher::new(registry, hp, publisher_config(30));

    publisher.stop().await;
    publisher.start();
    publisher.stop().await;
    publisher.stop().await;
    assert!(!publisher.is_running());
}
