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

//! Deposit records read back from the source handler contracts via
//! `getDepositRecord(uint64,uint8)`. The field layout is kind-specific.

use ethers::abi::{ParamType, Token};
use ethers::types::{Address, U256};
use trestle_relayer_types::ResourceId;
use trestle_relayer_utils::{Error, Result};

use crate::contracts::decode_tokens;

/// A fungible deposit as recorded by the erc20 handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Erc20DepositRecord {
    pub token_address: Address,
    pub len_destination_recipient_address: u8,
    pub destination_chain_id: u8,
    pub resource_id: ResourceId,
    pub destination_recipient_address: Vec<u8>,
    pub depositer: Address,
    pub amount: U256,
}

impl Erc20DepositRecord {
    fn layout() -> ParamType {
        ParamType::Tuple(vec![
            ParamType::Address,
            ParamType::Uint(8),
            ParamType::Uint(8),
            ParamType::FixedBytes(32),
            ParamType::Bytes,
            ParamType::Address,
            ParamType::Uint(256),
        ])
    }

    pub fn decode(ret: &[u8]) -> Result<Self> {
        let fields = tuple_fields::<7>(Self::layout(), ret)?;
        match fields {
            [Token::Address(token_address), Token::Uint(len_recipient), Token::Uint(destination_chain_id), Token::FixedBytes(resource_id), Token::Bytes(destination_recipient_address), Token::Address(depositer), Token::Uint(amount)] => {
                Ok(Self {
                    token_address,
                    len_destination_recipient_address: len_recipient.low_u64()
                        as u8,
                    destination_chain_id: destination_chain_id.low_u64() as u8,
                    resource_id: ResourceId::from_slice(&resource_id),
                    destination_recipient_address,
                    depositer,
                    amount,
                })
            }
            _ => Err(Error::AbiDecode(
                "malformed erc20 deposit record".into(),
            )),
        }
    }
}

/// A non-fungible deposit as recorded by the erc721 handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Erc721DepositRecord {
    pub token_address: Address,
    pub len_destination_recipient_address: u8,
    pub destination_chain_id: u8,
    pub resource_id: ResourceId,
    pub destination_recipient_address: Vec<u8>,
    pub depositer: Address,
    pub token_id: U256,
    pub metadata: Vec<u8>,
}

impl Erc721DepositRecord {
    fn layout() -> ParamType {
        ParamType::Tuple(vec![
            ParamType::Address,
            ParamType::Uint(8),
            ParamType::Uint(8),
            ParamType::FixedBytes(32),
            ParamType::Bytes,
            ParamType::Address,
            ParamType::Uint(256),
            ParamType::Bytes,
        ])
    }

    pub fn decode(ret: &[u8]) -> Result<Self> {
        let fields = tuple_fields::<8>(Self::layout(), ret)?;
        match fields {
            [Token::Address(token_address), Token::Uint(len_recipient), Token::Uint(destination_chain_id), Token::FixedBytes(resource_id), Token::Bytes(destination_recipient_address), Token::Address(depositer), Token::Uint(token_id), Token::Bytes(metadata)] => {
                Ok(Self {
                    token_address,
                    len_destination_recipient_address: len_recipient.low_u64()
                        as u8,
                    destination_chain_id: destination_chain_id.low_u64() as u8,
                    resource_id: ResourceId::from_slice(&resource_id),
                    destination_recipient_address,
                    depositer,
                    token_id,
                    metadata,
                })
            }
            _ => Err(Error::AbiDecode(
                "malformed erc721 deposit record".into(),
            )),
        }
    }
}

/// A generic deposit as recorded by the generic handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericDepositRecord {
    pub destination_chain_id: u8,
    pub resource_id: ResourceId,
    pub depositer: Address,
    pub metadata: Vec<u8>,
}

impl GenericDepositRecord {
    fn layout() -> ParamType {
        ParamType::Tuple(vec![
            ParamType::Uint(8),
            ParamType::FixedBytes(32),
            ParamType::Address,
            ParamType::Bytes,
        ])
    }

    pub fn decode(ret: &[u8]) -> Result<Self> {
        let fields = tuple_fields::<4>(Self::layout(), ret)?;
        match fields {
            [Token::Uint(destination_chain_id), Token::FixedBytes(resource_id), Token::Address(depositer), Token::Bytes(metadata)] => {
                Ok(Self {
                    destination_chain_id: destination_chain_id.low_u64() as u8,
                    resource_id: ResourceId::from_slice(&resource_id),
                    depositer,
                    metadata,
                })
            }
            _ => Err(Error::AbiDecode(
                "malformed generic deposit record".into(),
            )),
        }
    }
}

fn tuple_fields<const N: usize>(
    layout: ParamType,
    ret: &[u8],
) -> Result<[Token; N]> {
    let tokens = decode_tokens(&[layout], ret)?;
    let fields = match tokens.into_iter().next() {
        Some(Token::Tuple(fields)) => fields,
        _ => {
            return Err(Error::AbiDecode(
                "deposit record is not a tuple".into(),
            ))
        }
    };
    fields
        .try_into()
        .map_err(|_| Error::AbiDecode("wrong deposit record arity".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::abi;

    fn encode_erc20(record: &Erc20DepositRecord) -> Vec<u8> {
        abi::encode(&[Token::Tuple(vec![
            Token::Address(record.token_address),
            Token::Uint(record.len_destination_recipient_address.into()),
            Token::Uint(record.destination_chain_id.into()),
            Token::FixedBytes(record.resource_id.to_bytes().to_vec()),
            Token::Bytes(record.destination_recipient_address.clone()),
            Token::Address(record.depositer),
            Token::Uint(record.amount),
        ])])
    }

    fn encode_erc721(record: &Erc721DepositRecord) -> Vec<u8> {
        abi::encode(&[Token::Tuple(vec![
            Token::Address(record.token_address),
            Token::Uint(record.len_destination_recipient_address.into()),
            Token::Uint(record.destination_chain_id.into()),
            Token::FixedBytes(record.resource_id.to_bytes().to_vec()),
            Token::Bytes(record.destination_recipient_address.clone()),
            Token::Address(record.depositer),
            Token::Uint(record.token_id),
            Token::Bytes(record.metadata.clone()),
        ])])
    }

    fn encode_generic(record: &GenericDepositRecord) -> Vec<u8> {
        abi::encode(&[Token::Tuple(vec![
            Token::Uint(record.destination_chain_id.into()),
            Token::FixedBytes(record.resource_id.to_bytes().to_vec()),
            Token::Address(record.depositer),
            Token::Bytes(record.metadata.clone()),
        ])])
    }

    #[test]
    fn erc20_record_round_trips() {
        let record = Erc20DepositRecord {
            token_address: Address::repeat_byte(0x01),
            len_destination_recipient_address: 20,
            destination_chain_id: 2,
            resource_id: ResourceId([0xab; 32]),
            destination_recipient_address: vec![0x11; 20],
            depositer: Address::repeat_byte(0x02),
            amount: U256::from(1_000u64),
        };
        let decoded =
            Erc20DepositRecord::decode(&encode_erc20(&record)).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn erc721_record_round_trips() {
        let record = Erc721DepositRecord {
            token_address: Address::repeat_byte(0x03),
            len_destination_recipient_address: 20,
            destination_chain_id: 1,
            resource_id: ResourceId([0x0f; 32]),
            destination_recipient_address: vec![0x22; 20],
            depositer: Address::repeat_byte(0x04),
            token_id: U256::from(77u64),
            metadata: vec![0xde, 0xad],
        };
        let decoded =
            Erc721DepositRecord::decode(&encode_erc721(&record)).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn generic_record_round_trips() {
        let record = GenericDepositRecord {
            destination_chain_id: 3,
            resource_id: ResourceId([0x55; 32]),
            depositer: Address::repeat_byte(0x05),
            metadata: vec![0x01, 0x02, 0x03],
        };
        let decoded =
            GenericDepositRecord::decode(&encode_generic(&record)).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn truncated_record_is_rejected() {
        let record = GenericDepositRecord {
            destination_chain_id: 3,
            resource_id: ResourceId([0x55; 32]),
            depositer: Address::repeat_byte(0x05),
            metadata: vec![],
        };
        let mut encoded = encode_generic(&record);
        encoded.truncate(16);
        assert!(GenericDepositRecord::decode(&encoded).is_err());
    }
}
