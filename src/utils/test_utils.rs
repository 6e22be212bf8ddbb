//! Test utilities shared by the machine tests.
