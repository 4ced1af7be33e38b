//! Testing helpers and mock utilities.
//!
//! Provides convenient constructors for resource snapshots and mocked runtimes.

use crate::runtime::{MockContainerRuntime, Resource, ResourceState};

/// Build `count` running containers with distinct hex ids.
///
/// Container `n` (starting at 1) is named `/svc-n` and its id starts with
/// ten copies of the hex digit for `n`, so prefixes stay distinguishable.
#[must_use]
pub fn sample_resources(count: usize) -> Vec<Resource> {
    (1..=count)
        .map(|n| {
            let digit = std::char::from_digit(u32::try_from(n % 16).unwrap_or(0), 16)
                .unwrap_or('0');
            Resource {
                id: format!("{}{}", digit.to_string().repeat(10), "00aabbccdd"),
                name: format!("/svc-{n}"),
                state: ResourceState::Running,
                status: "Up 5 minutes".to_string(),
                image: "alpine:3".to_string(),
                stack: None,
            }
        })
        .collect()
}

/// Create a mock runtime whose `list` returns a fixed snapshot.
///
/// Every other method is left without expectations, so an unexpected call
/// fails the test.
#[must_use]
pub fn mock_runtime_listing(resources: Vec<Resource>) -> MockContainerRuntime {
    let mut mock = MockContainerRuntime::new();
    mock.expect_list()
        .returning(move |_| Ok(resources.clone()));
    mock
}
