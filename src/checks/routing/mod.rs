//! 路由測試：`anta.tests.routing.generic` 與 `anta.tests.routing.bgp`

pub mod bgp;
pub mod generic;

use super::TestSpec;

pub fn specs() -> Vec<TestSpec> {
    let mut specs = generic::specs();
    specs.extend(bgp::specs());
    specs
}
