//! Test suites for the Gizmo host daemon.

mod support;
