//! # Constants
//!
//! Shared constants used throughout the toolkit.
//!
//! These values represent the layout of the IAM demo GitOps repository and
//! reasonable defaults for cluster interaction. Most can be overridden via
//! command-line flags or environment variables where applicable.

/// Ingress controller service in `<namespace>/<name>` form
pub const DEFAULT_INGRESS_SERVICE: &str = "ingress-nginx/ingress-nginx-controller";

/// IngressClass recorded when neither the flag nor the params file names one
pub const DEFAULT_INGRESS_CLASS: &str = "nginx";

/// Primary params file rewritten by `configure-hosts`
pub const DEFAULT_PARAMS_FILE: &str = "gitops/apps/iam/params.env";

/// Params files kept in sync with [`DEFAULT_PARAMS_FILE`]
pub const DEFAULT_EXTRA_PARAMS_FILES: &[&str] = &["gitops/clusters/aks/bootstrap/params.env"];

/// Manifests whose nip.io hostnames are rewritten in place
pub const DEFAULT_MANIFEST_FILES: &[&str] = &[
    "gitops/apps/iam/keycloak/keycloak.yaml",
    "gitops/apps/iam/keycloak/ingress.yaml",
    "gitops/apps/iam/midpoint/ingress.yaml",
    "gitops/clusters/aks/bootstrap/argocd-ingress.yaml",
];

/// Paths that must not contain stale nip.io hostnames after a rotation
pub const DEFAULT_VALIDATION_PATHS: &[&str] = &["gitops"];

/// Keycloak custom resource checked for typed database/hostname fields
pub const DEFAULT_KEYCLOAK_MANIFEST: &str = "gitops/apps/iam/keycloak/keycloak.yaml";

/// Root scanned by the repository contract checks
pub const DEFAULT_CONTRACTS_ROOT: &str = "gitops";

/// Ports probed when verifying the ingress load balancer accepts connections
pub const DEFAULT_PROBE_PORTS: &[u16] = &[80, 443];

/// TCP connect timeout for each reachability probe (seconds)
pub const DEFAULT_TCP_PROBE_TIMEOUT_SECS: u64 = 5;

/// How long to wait for the load balancer to publish an address (seconds)
pub const DEFAULT_LOAD_BALANCER_TIMEOUT_SECS: u64 = 900;

/// Poll interval while waiting for the load balancer (seconds)
pub const DEFAULT_LOAD_BALANCER_INTERVAL_SECS: u64 = 15;

/// Service annotation pinning the Azure load balancer to a resource group
pub const AZURE_LB_RESOURCE_GROUP_ANNOTATION: &str =
    "service.beta.kubernetes.io/azure-load-balancer-resource-group";

/// Name of the load balancer AKS creates for `LoadBalancer` services
pub const AKS_LOAD_BALANCER_NAME: &str = "kubernetes";

/// Secret consumed by cloudnative-pg for Azure Blob backups
pub const DEFAULT_BACKUP_SECRET_NAME: &str = "cnpg-azure-backup";

/// Wildcard DNS suffix used for demo hostnames
pub const NIP_IO_SUFFIX: &str = "nip.io";

/// Azure public cloud storage endpoint suffix
pub const AZURE_ENDPOINT_SUFFIX: &str = "core.windows.net";
