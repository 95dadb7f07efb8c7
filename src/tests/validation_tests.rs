//! Form Validation Tests
//!
//! `CreationRequest::from_form` is the only way to obtain a request, so
//! every rejection path is exercised here without any ledger double.

#[cfg(test)]
mod validation_tests {
    use proptest::prelude::*;
    use solana_sdk::{pubkey::Pubkey, signer::Signer};

    use crate::errors::ValidationError;
    use crate::test_utils::{demo_form, payer_key};
    use crate::types::{
        AuthorityDirective, AuthorityInput, AuthorityKind, CreationRequest, Network, TokenForm,
    };

    fn demo() -> TokenForm {
        let (_, key) = payer_key();
        demo_form(&key)
    }

    #[test]
    fn test_demo_form_is_valid() {
        let (payer, key) = payer_key();
        let request = CreationRequest::from_form(&demo_form(&key)).unwrap();

        assert_eq!(request.network(), Network::Devnet);
        assert_eq!(request.payer().pubkey(), payer.pubkey());
        assert_eq!(request.token().name, "Demo");
        assert_eq!(request.token().base_unit_supply(), 1_000_000_000_000);
        assert!(request.custom_endpoint().is_none());
        assert!(request.authorities().mint.is_keep());
    }

    #[test]
    fn test_decimals_out_of_range() {
        for value in ["10", "-1", "255"] {
            let form = TokenForm {
                decimals: value.to_string(),
                ..demo()
            };
            let err = CreationRequest::from_form(&form).unwrap_err();
            assert!(
                matches!(err, ValidationError::DecimalsOutOfRange { .. }),
                "decimals {value}: {err}"
            );
        }
    }

    #[test]
    fn test_non_numeric_fields() {
        let form = TokenForm {
            supply: "1e6".to_string(),
            ..demo()
        };
        assert_eq!(
            CreationRequest::from_form(&form).unwrap_err(),
            ValidationError::InvalidInteger {
                field: "supply",
                value: "1e6".to_string()
            }
        );

        let form = TokenForm {
            decimals: "six".to_string(),
            ..demo()
        };
        assert!(matches!(
            CreationRequest::from_form(&form),
            Err(ValidationError::InvalidInteger { field: "decimals", .. })
        ));
    }

    #[test]
    fn test_supply_overflow() {
        let form = TokenForm {
            supply: u64::MAX.to_string(),
            decimals: "9".to_string(),
            ..demo()
        };
        assert!(matches!(
            CreationRequest::from_form(&form),
            Err(ValidationError::SupplyOverflow { decimals: 9, .. })
        ));

        let form = TokenForm {
            supply: u64::MAX.to_string(),
            decimals: "0".to_string(),
            ..demo()
        };
        assert!(CreationRequest::from_form(&form).is_ok());
    }

    #[test]
    fn test_required_fields() {
        let form = TokenForm {
            name: "   ".to_string(),
            ..demo()
        };
        assert_eq!(
            CreationRequest::from_form(&form).unwrap_err(),
            ValidationError::MissingField("name")
        );

        let form = TokenForm {
            icon: None,
            ..demo()
        };
        assert_eq!(
            CreationRequest::from_form(&form).unwrap_err(),
            ValidationError::MissingIcon
        );
    }

    #[test]
    fn test_field_lengths() {
        let form = TokenForm {
            symbol: "TOOLONGSYMBOL".to_string(),
            ..demo()
        };
        assert!(matches!(
            CreationRequest::from_form(&form),
            Err(ValidationError::FieldTooLong { field: "symbol", max: 10, .. })
        ));
    }

    #[test]
    fn test_network_and_urls() {
        let form = TokenForm {
            network: "testnet".to_string(),
            ..demo()
        };
        assert_eq!(
            CreationRequest::from_form(&form).unwrap_err(),
            ValidationError::UnknownNetwork("testnet".to_string())
        );

        let form = TokenForm {
            network: "mainnet".to_string(),
            custom_rpc_url: "https://rpc.example.com".to_string(),
            ..demo()
        };
        let request = CreationRequest::from_form(&form).unwrap();
        assert_eq!(request.network(), Network::MainnetBeta);
        assert_eq!(request.custom_endpoint(), Some("https://rpc.example.com"));

        let form = TokenForm {
            custom_rpc_url: "ftp://rpc.example.com".to_string(),
            ..demo()
        };
        assert!(matches!(
            CreationRequest::from_form(&form),
            Err(ValidationError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_bad_payer_key() {
        let form = TokenForm {
            payer_key: "not-a-key".to_string(),
            ..demo()
        };
        assert!(matches!(
            CreationRequest::from_form(&form),
            Err(ValidationError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_authority_selections() {
        let target = Pubkey::new_unique();
        let form = TokenForm {
            mint_authority: AuthorityInput::revoke(),
            freeze_authority: AuthorityInput::default(),
            update_authority: AuthorityInput::transfer(target.to_string()),
            ..demo()
        };
        let request = CreationRequest::from_form(&form).unwrap();
        assert_eq!(request.authorities().mint, AuthorityDirective::Revoke);
        assert_eq!(request.authorities().freeze, AuthorityDirective::Keep);
        assert_eq!(request.authorities().update, AuthorityDirective::Transfer(target));
        assert!(request.authorities().metadata_is_mutable());

        let form = TokenForm {
            freeze_authority: AuthorityInput::transfer(""),
            ..demo()
        };
        assert!(matches!(
            CreationRequest::from_form(&form),
            Err(ValidationError::MissingField(_))
        ));

        let form = TokenForm {
            mint_authority: AuthorityInput::transfer("xyz"),
            ..demo()
        };
        assert!(matches!(
            CreationRequest::from_form(&form),
            Err(ValidationError::InvalidAuthorityTarget {
                authority: AuthorityKind::Mint,
                ..
            })
        ));

        let form = TokenForm {
            update_authority: AuthorityInput {
                mode: "burn".to_string(),
                target: String::new(),
            },
            ..demo()
        };
        assert!(matches!(
            CreationRequest::from_form(&form),
            Err(ValidationError::UnknownAuthorityMode {
                authority: AuthorityKind::Update,
                ..
            })
        ));
    }

    #[test]
    fn test_transfer_to_payer_rejected() {
        let (payer, key) = payer_key();
        let form = TokenForm {
            freeze_authority: AuthorityInput::transfer(payer.pubkey().to_string()),
            ..demo_form(&key)
        };
        assert_eq!(
            CreationRequest::from_form(&form).unwrap_err(),
            ValidationError::TransferToPayer {
                authority: AuthorityKind::Freeze
            }
        );
    }

    proptest! {
        #[test]
        fn prop_decimals_accepted_iff_in_range(decimals in -1_000i64..1_000) {
            let form = TokenForm {
                supply: "1".to_string(),
                decimals: decimals.to_string(),
                ..demo()
            };
            let result = CreationRequest::from_form(&form);
            if (0..=9).contains(&decimals) {
                prop_assert!(result.is_ok());
            } else {
                prop_assert_eq!(
                    result.unwrap_err(),
                    ValidationError::DecimalsOutOfRange { value: decimals }
                );
            }
        }

        #[test]
        fn prop_base_units_never_wrap(supply in any::<u64>(), decimals in 0u8..=9) {
            let form = TokenForm {
                supply: supply.to_string(),
                decimals: decimals.to_string(),
                ..demo()
            };
            match CreationRequest::from_form(&form) {
                Ok(request) => prop_assert_eq!(
                    u128::from(request.token().base_unit_supply()),
                    u128::from(supply) * 10u128.pow(u32::from(decimals))
                ),
                Err(err) => {
                    prop_assert!(
                        matches!(err, ValidationError::SupplyOverflow { .. }),
                        "unexpected: {}",
                        err
                    );
                    let base_units = u128::from(supply) * 10u128.pow(u32::from(decimals));
                    prop_assert!(base_units > u128::from(u64::MAX));
                }
            }
        }
    }
}
