// Copyright 2023 Trestle Network
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Calldata builders and return decoders for the bridge and handler
//! contracts. The byte layouts here are wire-critical and must match the
//! deployed contract ABIs exactly.

use ethers::abi::{self, ParamType, Token};
use ethers::types::{Address, H256, U256};
use ethers::utils::keccak256;
use trestle_relayer_types::{
    ChainId, DepositNonce, ProposalStatus, ResourceId,
};
use trestle_relayer_utils::{Error, Result};

use crate::api::BridgeProposal;

fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

fn encode_call(signature: &str, args: &[Token]) -> Vec<u8> {
    let mut calldata = selector(signature).to_vec();
    calldata.extend_from_slice(&abi::encode(args));
    calldata
}

pub(crate) fn decode_tokens(
    types: &[ParamType],
    data: &[u8],
) -> Result<Vec<Token>> {
    abi::decode(types, data).map_err(|e| Error::AbiDecode(e.to_string()))
}

/// The `idAndNonce` packing used by the vote-record accessor: the deposit
/// nonce shifted left by one byte, or-ed with the source chain id.
pub fn id_and_nonce(source: ChainId, nonce: DepositNonce) -> U256 {
    (U256::from(nonce.0) << 8) | U256::from(source.0)
}

/// `_chainID()`
pub fn chain_id_call() -> Vec<u8> {
    encode_call("_chainID()", &[])
}

pub fn decode_chain_id(ret: &[u8]) -> Result<u8> {
    let tokens = decode_tokens(&[ParamType::Uint(8)], ret)?;
    match tokens.as_slice() {
        [Token::Uint(id)] => Ok(id.low_u64() as u8),
        _ => Err(Error::AbiDecode("malformed _chainID return".into())),
    }
}

/// `_resourceIDToHandlerAddress(bytes32)`
pub fn resource_id_to_handler_address_call(
    resource_id: ResourceId,
) -> Vec<u8> {
    encode_call(
        "_resourceIDToHandlerAddress(bytes32)",
        &[Token::FixedBytes(resource_id.to_bytes().to_vec())],
    )
}

pub fn decode_handler_address(ret: &[u8]) -> Result<Address> {
    let tokens = decode_tokens(&[ParamType::Address], ret)?;
    match tokens.as_slice() {
        [Token::Address(handler)] => Ok(*handler),
        _ => Err(Error::AbiDecode(
            "malformed _resourceIDToHandlerAddress return".into(),
        )),
    }
}

/// `getProposal(uint8,uint64,bytes32)`
pub fn get_proposal_call(
    source: ChainId,
    nonce: DepositNonce,
    data_hash: H256,
) -> Vec<u8> {
    encode_call(
        "getProposal(uint8,uint64,bytes32)",
        &[
            Token::Uint(source.0.into()),
            Token::Uint(nonce.0.into()),
            Token::FixedBytes(data_hash.as_bytes().to_vec()),
        ],
    )
}

/// Decodes the proposal record returned by `getProposal`:
/// `(bytes32 resourceID, bytes32 dataHash, address[] yesVotes,
///   address[] noVotes, uint8 status, uint256 proposedBlock)`.
pub fn decode_proposal(ret: &[u8]) -> Result<BridgeProposal> {
    let layout = ParamType::Tuple(vec![
        ParamType::FixedBytes(32),
        ParamType::FixedBytes(32),
        ParamType::Array(Box::new(ParamType::Address)),
        ParamType::Array(Box::new(ParamType::Address)),
        ParamType::Uint(8),
        ParamType::Uint(256),
    ]);
    let tokens = decode_tokens(&[layout], ret)?;
    let fields = match tokens.into_iter().next() {
        Some(Token::Tuple(fields)) => fields,
        _ => {
            return Err(Error::AbiDecode(
                "malformed getProposal return".into(),
            ))
        }
    };
    let fields: [Token; 6] = fields.try_into().map_err(|_| {
        Error::AbiDecode("malformed getProposal return".into())
    })?;
    match fields {
        [Token::FixedBytes(resource_id), Token::FixedBytes(data_hash), Token::Array(yes_votes), Token::Array(no_votes), Token::Uint(status), Token::Uint(proposed_block)] =>
        {
            let status = ProposalStatus::from_u8(status.low_u64() as u8)
                .ok_or_else(|| {
                    Error::AbiDecode("unknown proposal status".into())
                })?;
            Ok(BridgeProposal {
                resource_id: ResourceId::from_slice(&resource_id),
                data_hash: H256::from_slice(&data_hash),
                yes_votes: addresses(yes_votes),
                no_votes: addresses(no_votes),
                status,
                proposed_block,
            })
        }
        _ => Err(Error::AbiDecode("malformed getProposal return".into())),
    }
}

fn addresses(tokens: Vec<Token>) -> Vec<Address> {
    tokens
        .into_iter()
        .filter_map(|token| match token {
            Token::Address(address) => Some(address),
            _ => None,
        })
        .collect()
}

/// `_hasVotedOnProposal(uint72,bytes32,address)`
pub fn has_voted_on_proposal_call(
    id_and_nonce: U256,
    data_hash: H256,
    relayer: Address,
) -> Vec<u8> {
    encode_call(
        "_hasVotedOnProposal(uint72,bytes32,address)",
        &[
            Token::Uint(id_and_nonce),
            Token::FixedBytes(data_hash.as_bytes().to_vec()),
            Token::Address(relayer),
        ],
    )
}

pub fn decode_bool(ret: &[u8]) -> Result<bool> {
    let tokens = decode_tokens(&[ParamType::Bool], ret)?;
    match tokens.as_slice() {
        [Token::Bool(value)] => Ok(*value),
        _ => Err(Error::AbiDecode("malformed bool return".into())),
    }
}

/// `voteProposal(uint8,uint64,bytes32,bytes,bytes32)`
pub fn vote_proposal_call(
    source: ChainId,
    nonce: DepositNonce,
    resource_id: ResourceId,
    data: &[u8],
    data_hash: H256,
) -> Vec<u8> {
    encode_call(
        "voteProposal(uint8,uint64,bytes32,bytes,bytes32)",
        &[
            Token::Uint(source.0.into()),
            Token::Uint(nonce.0.into()),
            Token::FixedBytes(resource_id.to_bytes().to_vec()),
            Token::Bytes(data.to_vec()),
            Token::FixedBytes(data_hash.as_bytes().to_vec()),
        ],
    )
}

/// `executeProposal(uint8,uint64,bytes,bytes32)`
pub fn execute_proposal_call(
    source: ChainId,
    nonce: DepositNonce,
    data: &[u8],
    resource_id: ResourceId,
) -> Vec<u8> {
    encode_call(
        "executeProposal(uint8,uint64,bytes,bytes32)",
        &[
            Token::Uint(source.0.into()),
            Token::Uint(nonce.0.into()),
            Token::Bytes(data.to_vec()),
            Token::FixedBytes(resource_id.to_bytes().to_vec()),
        ],
    )
}

/// `getDepositRecord(uint64,uint8)`
pub fn get_deposit_record_call(
    nonce: DepositNonce,
    destination: ChainId,
) -> Vec<u8> {
    encode_call(
        "getDepositRecord(uint64,uint8)",
        &[
            Token::Uint(nonce.0.into()),
            Token::Uint(destination.0.into()),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_and_nonce_packs_nonce_above_chain_id() {
        let packed = id_and_nonce(ChainId(1), DepositNonce(7));
        assert_eq!(packed, U256::from(0x0701u64));
        let wide = id_and_nonce(ChainId(0xff), DepositNonce(u64::MAX));
        assert_eq!(wide, (U256::from(u64::MAX) << 8) | U256::from(0xffu64));
    }

    #[test]
    fn vote_proposal_calldata_round_trips() {
        let data = vec![0xde, 0xad, 0xbe, 0xef];
        let data_hash = H256::repeat_byte(0x77);
        let calldata = vote_proposal_call(
            ChainId(1),
            DepositNonce(7),
            ResourceId([0xab; 32]),
            &data,
            data_hash,
        );
        let expected_selector =
            &keccak256(b"voteProposal(uint8,uint64,bytes32,bytes,bytes32)")
                [..4];
        assert_eq!(&calldata[..4], expected_selector);

        let tokens = abi::decode(
            &[
                ParamType::Uint(8),
                ParamType::Uint(64),
                ParamType::FixedBytes(32),
                ParamType::Bytes,
                ParamType::FixedBytes(32),
            ],
            &calldata[4..],
        )
        .unwrap();
        assert_eq!(tokens[0], Token::Uint(U256::from(1u8)));
        assert_eq!(tokens[1], Token::Uint(U256::from(7u64)));
        assert_eq!(tokens[2], Token::FixedBytes(vec![0xab; 32]));
        assert_eq!(tokens[3], Token::Bytes(data));
        assert_eq!(
            tokens[4],
            Token::FixedBytes(data_hash.as_bytes().to_vec())
        );
    }

    #[test]
    fn execute_proposal_calldata_round_trips() {
        let calldata = execute_proposal_call(
            ChainId(2),
            DepositNonce(9),
            &[0x01, 0x02],
            ResourceId([0x0c; 32]),
        );
        let expected_selector =
            &keccak256(b"executeProposal(uint8,uint64,bytes,bytes32)")[..4];
        assert_eq!(&calldata[..4], expected_selector);

        let tokens = abi::decode(
            &[
                ParamType::Uint(8),
                ParamType::Uint(64),
                ParamType::Bytes,
                ParamType::FixedBytes(32),
            ],
            &calldata[4..],
        )
        .unwrap();
        assert_eq!(tokens[0], Token::Uint(U256::from(2u8)));
        assert_eq!(tokens[2], Token::Bytes(vec![0x01, 0x02]));
    }

    #[test]
    fn proposal_decodes_from_its_abi_encoding() {
        let encoded = abi::encode(&[Token::Tuple(vec![
            Token::FixedBytes(vec![0x0a; 32]),
            Token::FixedBytes(vec![0x0b; 32]),
            Token::Array(vec![Token::Address(Address::repeat_byte(0x01))]),
            Token::Array(vec![]),
            Token::Uint(U256::from(2u8)),
            Token::Uint(U256::from(1234u64)),
        ])]);
        let proposal = decode_proposal(&encoded).unwrap();
        assert_eq!(proposal.resource_id, ResourceId([0x0a; 32]));
        assert_eq!(proposal.data_hash, H256::repeat_byte(0x0b));
        assert_eq!(proposal.yes_votes.len(), 1);
        assert!(proposal.no_votes.is_empty());
        assert_eq!(proposal.status, ProposalStatus::Passed);
        assert_eq!(proposal.proposed_block, U256::from(1234u64));
    }

    #[test]
    fn unknown_status_is_rejected() {
        let encoded = abi::encode(&[Token::Tuple(vec![
            Token::FixedBytes(vec![0; 32]),
            Token::FixedBytes(vec![0; 32]),
            Token::Array(vec![]),
            Token::Array(vec![]),
            Token::Uint(U256::from(9u8)),
            Token::Uint(U256::zero()),
        ])]);
        assert!(decode_proposal(&encoded).is_err());
    }

    #[test]
    fn scalar_returns_decode() {
        let id = abi::encode(&[Token::Uint(U256::from(5u8))]);
        assert_eq!(decode_chain_id(&id).unwrap(), 5);

        let yes = abi::encode(&[Token::Bool(true)]);
        assert!(decode_bool(&yes).unwrap());

        let handler = Address::repeat_byte(0x33);
        let ret = abi::encode(&[Token::Address(handler)]);
        assert_eq!(decode_handler_address(&ret).unwrap(), handler);
    }
}
