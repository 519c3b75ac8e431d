use bip32::ChildNumber;
use std::fmt;
use thiserror::Error;

/// Position of a key inside a wallet tree, e.g. `m/44'/60'/0'`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeAddress(bip32::DerivationPath);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid node address")]
pub struct NodeAddressError {
    #[from]
    source: bip32::Error,
}

impl TryFrom<&str> for NodeAddress {
    type Error = NodeAddressError;

    fn try_from(path: &str) -> Result<Self, Self::Error> {
        let bip32_path = path.parse::<bip32::DerivationPath>()?;
        Ok(NodeAddress(bip32_path))
    }
}

impl NodeAddress {
    /// The master node `m`
    pub fn root() -> Self {
        NodeAddress(bip32::DerivationPath::default())
    }

    /// Raw indices with the hardened bit folded in
    pub fn indices(&self) -> Vec<u32> {
        self.0.iter().map(|child| child.0).collect()
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Address of the child at `index` below this node
    pub fn child(&self, index: u32, hardened: bool) -> Result<Self, NodeAddressError> {
        let mut path = self.0.clone();
        path.push(ChildNumber::new(index, hardened)?);
        Ok(NodeAddress(path))
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bip44_path() {
        let path = NodeAddress::try_from("m/44'/60'/0'/0/1").unwrap();
        assert_eq!(
            path.indices(),
            vec![0x8000_002C, 0x8000_003C, 0x8000_0000, 0, 1]
        );
        assert_eq!(path.depth(), 5);
    }

    #[test]
    fn test_root() {
        let root = NodeAddress::try_from("m").unwrap();
        assert!(root.is_root());
        assert_eq!(root, NodeAddress::root());
        assert_eq!(root.to_string(), "m");
    }

    #[test]
    fn test_child_display() {
        let node = NodeAddress::root()
            .child(44, true)
            .unwrap()
            .child(7, false)
            .unwrap();
        assert_eq!(node.to_string(), "m/44'/7");
        assert_eq!(NodeAddress::try_from("m/44'/7").unwrap(), node);
    }

    #[test]
    fn test_child_index_out_of_range() {
        assert!(NodeAddress::root().child(0x8000_0000, false).is_err());
    }

    #[test]
    fn test_invalid_path_no_m() {
        assert!(NodeAddress::try_from("44'/0'").is_err());
    }

    #[test]
    fn test_invalid_index() {
        assert!(NodeAddress::try_from("m/44'/invalid'/0'").is_err());
    }
}
