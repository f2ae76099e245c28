use serde::de::{self, DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::VaultError;
use crate::policy::LoginPayload;
use crate::store::VaultItem;

/// One variant per vault operation, with its arguments already typed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Login { username: String, password: String },
    VaultItems,
    PublicVaultItems,
    SearchVault { search_term: String },
    CreateVaultItem { content: String, is_public: bool },
    MakeVaultItemPublic { id: i64 },
}

/// Wire form: `{"operation": "<name>", "args": {...}}`.
#[derive(Debug, Clone, Deserialize)]
pub struct OperationRequest {
    pub operation: String,
    #[serde(default)]
    pub args: Value,
}

impl OperationRequest {
    pub fn into_operation(self) -> Result<Operation, VaultError> {
        Operation::parse(&self.operation, self.args)
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct LoginArgs {
    username: String,
    password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct SearchArgs {
    search_term: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct CreateArgs {
    content: String,
    is_public: bool,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct PublishArgs {
    #[serde(deserialize_with = "coerce_id")]
    id: i64,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Login { .. } => "login",
            Operation::VaultItems => "vaultItems",
            Operation::PublicVaultItems => "publicVaultItems",
            Operation::SearchVault { .. } => "searchVault",
            Operation::CreateVaultItem { .. } => "createVaultItem",
            Operation::MakeVaultItemPublic { .. } => "makeVaultItemPublic",
        }
    }

    // Operations an anonymous caller is refused before arguments are read.
    pub fn requires_session(name: &str) -> bool {
        matches!(name, "vaultItems" | "createVaultItem" | "makeVaultItemPublic")
    }

    // argument-less operations ignore `args`
    pub fn parse(name: &str, args: Value) -> Result<Self, VaultError> {
        let op = match name {
            "login" => {
                let a: LoginArgs = parse_args(name, args)?;
                Operation::Login {
                    username: a.username,
                    password: a.password,
                }
            }
            "vaultItems" => Operation::VaultItems,
            "publicVaultItems" => Operation::PublicVaultItems,
            "searchVault" => {
                let a: SearchArgs = parse_args(name, args)?;
                Operation::SearchVault {
                    search_term: a.search_term,
                }
            }
            "createVaultItem" => {
                let a: CreateArgs = parse_args(name, args)?;
                Operation::CreateVaultItem {
                    content: a.content,
                    is_public: a.is_public,
                }
            }
            "makeVaultItemPublic" => {
                let a: PublishArgs = parse_args(name, args)?;
                Operation::MakeVaultItemPublic { id: a.id }
            }
            other => return Err(VaultError::UnknownOperation(other.to_string())),
        };
        Ok(op)
    }
}

fn parse_args<T: DeserializeOwned>(name: &str, args: Value) -> Result<T, VaultError> {
    serde_json::from_value(args).map_err(|e| VaultError::InvalidArguments(format!("{name}: {e}")))
}

// accepts `2` or `"2"`
pub fn coerce_id<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Int(i64),
        Text(String),
    }

    match RawId::deserialize(deserializer)? {
        RawId::Int(id) => Ok(id),
        RawId::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| de::Error::custom(format!("id {text:?} is not an integer"))),
    }
}

/// Successful result of an operation, serialized as the bare payload.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum OperationOutput {
    Login(LoginPayload),
    Items(Vec<VaultItem>),
    Item(VaultItem),
}
