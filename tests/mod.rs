// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Aggregates the directory-based integration test submodules below into one
//! Cargo test binary.

mod support;

mod boundary;
mod debugger;
mod scenarios;
