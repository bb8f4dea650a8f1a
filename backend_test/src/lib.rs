use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, spanned::Spanned, FnArg, Ident, ItemFn, Pat, Signature, Type};

/// Transform an asynchronous test into a synchronous one running against a
/// fresh in-memory server, and inject dependencies.
///
/// Injectable dependencies are [`rocket::local::asynchronous::Client`] and
/// [`crate::model::store::Storage`]. Pass `voter` or `admin` to have the
/// client signed in as the matching demo user before the test starts.
#[proc_macro_attribute]
pub fn backend_test(args: TokenStream, input: TokenStream) -> TokenStream {
    let mut item_fn = parse_macro_input!(input as ItemFn);

    // Extract type information and reject invalid function signatures.
    let TestArgs {
        args: test_args,
        storage,
    } = match check_sig(item_fn.sig.clone()) {
        Ok(args) => args,
        Err(err) => {
            return err.into_compile_error().into();
        }
    };

    // Rename the future so the test can have its original name.
    let name = item_fn.sig.ident.clone();
    let new_name = format_ident!("{}_fut", name);
    item_fn.sig.ident = new_name.clone();

    // Log in the client as admin/voter if needed.
    let maybe_login = match parse_macro_input!(args as Option<Ident>) {
        Some(arg) if arg == "admin" || arg == "voter" => {
            let credentials = format_ident!("{}", arg);
            // The response borrows the client, so it must be gone before
            // the client is returned.
            quote! {
                {
                    let response = rocket_client
                        .post(uri!(crate::api::auth::login))
                        .header(rocket::http::ContentType::JSON)
                        .body(rocket::serde::json::json!(crate::model::user::Credentials::#credentials()).to_string())
                        .dispatch()
                        .await;
                    assert_eq!(rocket::http::Status::Ok, response.status(), "demo login failed");
                }
            }
        }
        Some(arg) => {
            return syn::Error::new(arg.span(), "Expected `admin` or `voter`")
                .into_compile_error()
                .into();
        }
        None => TokenStream2::new(),
    };

    // Only bind the storage handle for tests that take it.
    let bind_storage = if storage {
        quote! {
            let storage = rocket_client
                .rocket()
                .state::<crate::model::store::Storage>()
                .unwrap()
                .clone();
        }
    } else {
        TokenStream2::new()
    };

    // Rewrite the test function.
    quote! {
        #[test]
        fn #name() {
            /// Test setup.
            async fn setup() -> rocket::local::asynchronous::Client {
                log4rs_test_utils::test_logging::init_logging_once_for(
                    ["securevote_backend"],
                    None,
                    None,
                );
                let rocket_client = rocket::local::asynchronous::Client::tracked(crate::test_rocket())
                    .await
                    .unwrap();

                #maybe_login

                rocket_client
            }

            /// The test itself.
            #item_fn

            // Timers spawned by the server must live on the same runtime as
            // the test, so everything runs inside one `block_on`.
            let runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("rocket-worker-test-thread")
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();

            runtime.block_on(async {
                let rocket_client = setup().await;
                #bind_storage
                #new_name(#(#test_args),*).await
            });
        }
    }
    .into()
}

/// What the wrapped test asks to have injected.
struct TestArgs {
    /// Arguments to call the test with, in order.
    args: Vec<TokenStream2>,
    /// Whether one of them is the storage handle.
    storage: bool,
}

/// Ensure the wrapped test is async, extract parameters to inject, and reject unknown parameters.
fn check_sig(sig: Signature) -> Result<TestArgs, syn::Error> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }

    let mut has_client = false;
    let mut has_storage = false;
    let mut args = vec![];

    for input in &sig.inputs {
        if let FnArg::Typed(pat_type) = input {
            if let Pat::Ident(_) = &*pat_type.pat {
                if let Type::Path(type_path) = &*pat_type.ty {
                    if let Some(type_ident) = type_path.path.get_ident() {
                        if type_ident == "Client" {
                            if has_client {
                                return Err(syn::Error::new(input.span(), "Test cannot accept more than one `rocket::local::asynchronous::Client`"));
                            }
                            has_client = true;
                            args.push(quote! { rocket_client });
                            continue;
                        } else if type_ident == "Storage" {
                            if has_storage {
                                return Err(syn::Error::new(
                                    input.span(),
                                    "Test cannot accept more than one `Storage`",
                                ));
                            }
                            has_storage = true;
                            args.push(quote! { storage });
                            continue;
                        }
                    }
                }
            }
        }

        return Err(syn::Error::new(
            input.span(),
            "Expected one of `client_ident: Client` or `storage_ident: Storage`",
        ));
    }

    Ok(TestArgs {
        args,
        storage: has_storage,
    })
}
