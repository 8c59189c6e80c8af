//! # IAM Demo Ops
//!
//! Operational tooling for the IAM demo GitOps stack (Keycloak, midPoint,
//! Argo CD, ingress-nginx and cloudnative-pg on AKS).
//!
//! ## Overview
//!
//! 1. **Ingress discovery** - Resolves the ingress controller's external address and checks it is public and reachable
//! 2. **Host rotation** - Derives `nip.io` hostnames, rewrites params files and manifests, and fails on stale references
//! 3. **Load balancer provisioning** - Makes the ingress Service an Azure load balancer pinned to the node resource group
//! 4. **Storage credentials** - Normalizes Azure Storage credentials into the cloudnative-pg backup secret
//! 5. **Manifest checks** - Static contracts over the GitOps tree
//!
//! All cluster and cloud access goes through the `kubectl` and `az` binaries
//! via [`tools::CommandRunner`].

pub mod checks;
pub mod ci;
pub mod cli;
pub mod config;
pub mod constants;
pub mod hosts;
pub mod ingress;
pub mod observability;
pub mod storage;
pub mod tools;
